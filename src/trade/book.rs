//! Trader profiles, their named offers and offer matching.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{TradeError, TradeResult};
use crate::common::{CommunityId, UserId};

/// Book-assigned identity of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfferId(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trader {
    pub id: UserId,
    /// Public trainer name. Only traders with one show up in searches.
    pub name: Option<String>,
    pub communities: BTreeSet<CommunityId>,
    pub friends: BTreeSet<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner: UserId,
    /// Lower-cased; unique per owner.
    pub name: String,
    pub haves: BTreeSet<String>,
    pub wants: BTreeSet<String>,
    pub communities: BTreeSet<CommunityId>,
    pub friends: BTreeSet<UserId>,
    pub notified: BTreeSet<UserId>,
}

impl Offer {
    /// Whether `other` may be matched against this offer.
    fn is_visible_to(&self, other: &Offer) -> bool {
        self.friends.contains(&other.owner) || !self.communities.is_disjoint(&other.communities)
    }
}

/// A two-way overlap between an offer and one counterpart offer.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeMatch {
    /// Entities the offer wants that the counterpart has.
    pub wants: Vec<String>,
    /// Entities the offer has that the counterpart wants.
    pub haves: Vec<String>,
    pub user: UserId,
    pub offer: OfferId,
}

/// Result of processing an offer's matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedMatches {
    pub matches: Vec<TradeMatch>,
    /// Matches whose counterpart has not been told about this offer yet.
    pub to_notify: Vec<TradeMatch>,
}

/// Result row of a have/want search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub user: UserId,
    pub name: String,
    pub offer: String,
}

/// Which entities to remove from an offer.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    All,
    Only(&'a [String]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Haves,
    Wants,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeBook {
    traders: BTreeMap<UserId, Trader>,
    offers: BTreeMap<OfferId, Offer>,
    next_offer_id: u64,
}

/// Canonical offer name: the name part of a custom emoji, lower-cased.
pub fn offer_key(name: &str) -> String {
    let name = name.trim();
    let name = if name.starts_with("<:") {
        name.split(':').nth(1).unwrap_or(name)
    } else {
        name
    };
    name.to_lowercase()
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trader(&self, user: UserId) -> Option<&Trader> {
        self.traders.get(&user)
    }

    /// The trader profile of a user, created on first use.
    pub fn ensure_trader(&mut self, user: UserId) -> &mut Trader {
        self.traders.entry(user).or_insert_with(|| {
            debug!(user, "Trader added");
            Trader {
                id: user,
                ..Trader::default()
            }
        })
    }

    /// Set or clear the public trainer name.
    pub fn set_name(&mut self, user: UserId, name: Option<&str>) -> TradeResult<()> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            let taken = self.traders.values().any(|t| {
                t.id != user
                    && t.name
                        .as_deref()
                        .is_some_and(|other| other.eq_ignore_ascii_case(name))
            });
            if taken {
                return Err(TradeError::NameInUse {
                    name: name.to_string(),
                });
            }
        }
        self.ensure_trader(user).name = name.map(str::to_string);
        Ok(())
    }

    /// The trader with a public trainer name, compared case-insensitively.
    pub fn trader_by_name(&self, name: &str) -> Option<&Trader> {
        let name = name.trim();
        self.traders.values().find(|t| {
            t.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    /// Add a community to a trader and every offer they hold.
    pub fn add_community(&mut self, user: UserId, community: CommunityId) {
        if !self.ensure_trader(user).communities.insert(community) {
            return;
        }
        for offer in self.offers.values_mut().filter(|o| o.owner == user) {
            offer.communities.insert(community);
        }
    }

    /// Make two traders friends, updating both sides' offers.
    pub fn add_friend(&mut self, user: UserId, friend: UserId) {
        if user == friend {
            return;
        }
        self.ensure_trader(user).friends.insert(friend);
        self.ensure_trader(friend).friends.insert(user);
        for offer in self.offers.values_mut() {
            if offer.owner == user {
                offer.friends.insert(friend);
            } else if offer.owner == friend {
                offer.friends.insert(user);
            }
        }
    }

    pub fn add_offer(&mut self, user: UserId, name: &str) -> TradeResult<OfferId> {
        let key = offer_key(name);
        if self.offer_id(user, &key).is_some() {
            return Err(TradeError::OfferExists { name: key });
        }

        let trader = self.ensure_trader(user).clone();
        self.next_offer_id += 1;
        let id = OfferId(self.next_offer_id);
        debug!(user, offer = %key, "Offer added");
        self.offers.insert(
            id,
            Offer {
                id,
                owner: user,
                name: key,
                haves: BTreeSet::new(),
                wants: BTreeSet::new(),
                communities: trader.communities,
                friends: trader.friends,
                notified: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    pub fn find_offer(&self, user: UserId, name: &str) -> TradeResult<&Offer> {
        let key = offer_key(name);
        self.offer_id(user, &key)
            .and_then(|id| self.offers.get(&id))
            .ok_or(TradeError::OfferNotFound { name: key })
    }

    pub fn offer(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(&id)
    }

    /// Names of a user's offers.
    pub fn offer_names(&self, user: UserId) -> Vec<String> {
        self.offers
            .values()
            .filter(|o| o.owner == user)
            .map(|o| o.name.clone())
            .collect()
    }

    pub fn delete_offer(&mut self, user: UserId, name: &str) -> TradeResult<Offer> {
        let id = self.find_offer(user, name)?.id;
        self.offers
            .remove(&id)
            .ok_or(TradeError::OfferNotFound { name: offer_key(name) })
    }

    pub fn add_haves(&mut self, user: UserId, name: &str, entities: &[String]) -> TradeResult<()> {
        self.add_entities(user, name, Side::Haves, entities)
    }

    pub fn add_wants(&mut self, user: UserId, name: &str, entities: &[String]) -> TradeResult<()> {
        self.add_entities(user, name, Side::Wants, entities)
    }

    pub fn remove_haves(&mut self, user: UserId, name: &str, selection: Selection) -> TradeResult<()> {
        self.remove_entities(user, name, Side::Haves, selection)
    }

    pub fn remove_wants(&mut self, user: UserId, name: &str, selection: Selection) -> TradeResult<()> {
        self.remove_entities(user, name, Side::Wants, selection)
    }

    fn add_entities(
        &mut self,
        user: UserId,
        name: &str,
        side: Side,
        entities: &[String],
    ) -> TradeResult<()> {
        let offer = self.offer_mut(user, name)?;
        offer_side(offer, side).extend(entities.iter().cloned());
        Ok(())
    }

    fn remove_entities(
        &mut self,
        user: UserId,
        name: &str,
        side: Side,
        selection: Selection,
    ) -> TradeResult<()> {
        let offer = self.offer_mut(user, name)?;
        let set = offer_side(offer, side);
        match selection {
            Selection::All => set.clear(),
            Selection::Only(entities) => {
                for entity in entities {
                    set.remove(entity);
                }
            }
        }
        Ok(())
    }

    /// Offers of other users that want something this offer has and have
    /// something it wants, within a shared community or friendship.
    pub fn find_matches(&self, id: OfferId) -> Vec<TradeMatch> {
        let Some(offer) = self.offers.get(&id) else {
            return Vec::new();
        };

        self.offers
            .values()
            .filter(|other| other.owner != offer.owner && other.is_visible_to(offer))
            .filter_map(|other| {
                let wants: Vec<String> = offer.wants.intersection(&other.haves).cloned().collect();
                let haves: Vec<String> = offer.haves.intersection(&other.wants).cloned().collect();
                if wants.is_empty() || haves.is_empty() {
                    return None;
                }
                Some(TradeMatch {
                    wants,
                    haves,
                    user: other.owner,
                    offer: other.id,
                })
            })
            .collect()
    }

    /// Find matches and record notifications on both sides. Each counterpart
    /// is reported in `to_notify` only the first time it matches this offer.
    pub fn process_matches(&mut self, id: OfferId) -> TradeResult<ProcessedMatches> {
        let owner = self
            .offers
            .get(&id)
            .map(|o| o.owner)
            .ok_or(TradeError::OfferNotFound {
                name: format!("#{}", id.0),
            })?;

        let matches = self.find_matches(id);
        let mut to_notify = Vec::new();
        for trade in &matches {
            if self.set_notified(id, trade.user) {
                to_notify.push(trade.clone());
            }
            self.set_notified(trade.offer, owner);
        }
        debug!(offer = id.0, matches = matches.len(), notify = to_notify.len(), "Matches processed");
        Ok(ProcessedMatches { matches, to_notify })
    }

    /// Record that `user` was told about `offer`. Returns false if already recorded.
    pub fn set_notified(&mut self, offer: OfferId, user: UserId) -> bool {
        self.offers
            .get_mut(&offer)
            .is_some_and(|o| o.notified.insert(user))
    }

    /// Offers of other, publicly named traders in scope that have an entity.
    pub fn search_haves(&self, user: UserId, entity: &str) -> TradeResult<Vec<SearchHit>> {
        self.search(user, entity, Side::Haves)
    }

    /// Offers of other, publicly named traders in scope that want an entity.
    pub fn search_wants(&self, user: UserId, entity: &str) -> TradeResult<Vec<SearchHit>> {
        self.search(user, entity, Side::Wants)
    }

    fn search(&self, user: UserId, entity: &str, side: Side) -> TradeResult<Vec<SearchHit>> {
        let searcher = self.traders.get(&user).ok_or(TradeError::UserNotFound)?;
        let hits = self
            .offers
            .values()
            .filter(|o| o.owner != user)
            .filter(|o| o.friends.contains(&user) || !o.communities.is_disjoint(&searcher.communities))
            .filter(|o| match side {
                Side::Haves => o.haves.contains(entity),
                Side::Wants => o.wants.contains(entity),
            })
            .filter_map(|o| {
                let name = self.traders.get(&o.owner)?.name.clone()?;
                Some(SearchHit {
                    user: o.owner,
                    name,
                    offer: o.name.clone(),
                })
            })
            .collect();
        Ok(hits)
    }

    fn offer_id(&self, user: UserId, key: &str) -> Option<OfferId> {
        self.offers
            .values()
            .find(|o| o.owner == user && o.name == key)
            .map(|o| o.id)
    }

    fn offer_mut(&mut self, user: UserId, name: &str) -> TradeResult<&mut Offer> {
        let key = offer_key(name);
        let id = self
            .offer_id(user, &key)
            .ok_or(TradeError::OfferNotFound { name: key })?;
        self.offers
            .get_mut(&id)
            .ok_or(TradeError::OfferNotFound { name: name.to_string() })
    }
}

fn offer_side(offer: &mut Offer, side: Side) -> &mut BTreeSet<String> {
    match side {
        Side::Haves => &mut offer.haves,
        Side::Wants => &mut offer.wants,
    }
}
