use std::sync::Arc;

use skirmish_core::player::{PlayerId, PriorityTier};
use skirmish_core::ports::RankSource;

/// Ranks players and picks who gets bumped when a higher tier joins a full
/// instance.
pub struct PriorityResolver {
    ranks: Arc<dyn RankSource>,
}

impl PriorityResolver {
    pub fn new(ranks: Arc<dyn RankSource>) -> Self {
        Self { ranks }
    }

    pub fn priority_of(&self, player: PlayerId) -> PriorityTier {
        self.ranks.tier_of(player)
    }

    /// A member whose tier is strictly lower than the joiner's, or `None`.
    ///
    /// Picks a member of the lowest tier present. Among several members of
    /// that tier the earliest in `members` wins; callers must not rely on
    /// which one.
    pub fn find_eviction_candidate(
        &self,
        members: &[PlayerId],
        joining: PlayerId,
    ) -> Option<PlayerId> {
        let joining_tier = self.priority_of(joining);
        members
            .iter()
            .filter(|m| **m != joining)
            .map(|m| (*m, self.priority_of(*m)))
            .filter(|(_, tier)| *tier < joining_tier)
            .min_by_key(|(_, tier)| *tier)
            .map(|(m, _)| m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::test_helpers::{FixedRanks, make_players};

    fn resolver() -> (Arc<FixedRanks>, PriorityResolver) {
        let ranks = Arc::new(FixedRanks::default());
        let resolver = PriorityResolver::new(Arc::clone(&ranks) as Arc<dyn RankSource>);
        (ranks, resolver)
    }

    #[test]
    fn empty_members_yield_none() {
        let (ranks, resolver) = resolver();
        let joiner = make_players(1)[0];
        ranks.set(joiner, PriorityTier::Staff);
        assert_eq!(resolver.find_eviction_candidate(&[], joiner), None);
    }

    #[test]
    fn equal_or_higher_members_are_safe() {
        let (ranks, resolver) = resolver();
        let members = make_players(3);
        let joiner = make_players(1)[0];
        ranks.set(joiner, PriorityTier::Vip);
        ranks.set(members[0], PriorityTier::Vip);
        ranks.set(members[1], PriorityTier::Staff);
        ranks.set(members[2], PriorityTier::VipPlus);
        assert_eq!(resolver.find_eviction_candidate(&members, joiner), None);
    }

    #[test]
    fn default_joiner_never_evicts() {
        let (_, resolver) = resolver();
        let members = make_players(4);
        let joiner = make_players(1)[0];
        assert_eq!(resolver.find_eviction_candidate(&members, joiner), None);
    }

    #[test]
    fn lowest_tier_member_is_chosen() {
        let (ranks, resolver) = resolver();
        let members = make_players(3);
        let joiner = make_players(1)[0];
        ranks.set(joiner, PriorityTier::Staff);
        ranks.set(members[0], PriorityTier::VipPlus);
        ranks.set(members[1], PriorityTier::Default);
        ranks.set(members[2], PriorityTier::Vip);
        assert_eq!(
            resolver.find_eviction_candidate(&members, joiner),
            Some(members[1])
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn tier() -> impl Strategy<Value = PriorityTier> {
            (0usize..4).prop_map(|i| PriorityTier::ALL[i])
        }

        proptest! {
            #[test]
            fn candidate_is_strictly_lower_member(
                member_tiers in proptest::collection::vec(tier(), 0..12),
                joiner_tier in tier(),
            ) {
                let (ranks, resolver) = resolver();
                let members = make_players(member_tiers.len());
                for (m, t) in members.iter().zip(&member_tiers) {
                    ranks.set(*m, *t);
                }
                let joiner = make_players(1)[0];
                ranks.set(joiner, joiner_tier);

                let any_lower = member_tiers.iter().any(|t| *t < joiner_tier);
                match resolver.find_eviction_candidate(&members, joiner) {
                    Some(victim) => {
                        prop_assert!(members.contains(&victim));
                        prop_assert!(resolver.priority_of(victim) < joiner_tier);
                    },
                    None => prop_assert!(!any_lower),
                }
            }
        }
    }
}
