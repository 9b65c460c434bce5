//! Attach free-floating attachments to the movements they document.
//!
//! Upstream attachments rarely carry a usable foreign key, so matching runs
//! through an ordered list of [`MatchTier`]s and the first tier that locates
//! a movement wins:
//!
//! 1. [`DirectId`]: `movement_id` equals a movement's `id`
//! 2. [`ExactInstant`]: the attachment's reference timestamp equals a
//!    movement's timestamp exactly
//! 3. [`SameDay`]: the first movement on the same `YYYY-MM-DD` day
//!
//! Tiers 2 and 3 take the first candidate in input order. When several
//! movements share an instant or a day the result depends on that order;
//! it is not a "closest" match. Attachments no tier can place stay out of
//! every movement and remain only in the flat attachment list.

use tracing::debug;

use crate::movements::{Attachment, Movement};

/// One matching strategy.
pub trait MatchTier: Send + Sync {
    /// Short label used in reports and logs.
    fn name(&self) -> &'static str;

    /// Index into `movements` of the entry `attachment` belongs to.
    fn locate(&self, attachment: &Attachment, movements: &[Movement]) -> Option<usize>;
}

/// Exact `movement_id` → `id` match.
pub struct DirectId;

impl MatchTier for DirectId {
    fn name(&self) -> &'static str {
        "direct_id"
    }

    fn locate(&self, attachment: &Attachment, movements: &[Movement]) -> Option<usize> {
        let wanted = attachment.movement_id.as_deref()?;
        movements.iter().position(|m| m.id == wanted)
    }
}

/// Exact timestamp match on the full canonical instant.
pub struct ExactInstant;

impl MatchTier for ExactInstant {
    fn name(&self) -> &'static str {
        "exact_instant"
    }

    fn locate(&self, attachment: &Attachment, movements: &[Movement]) -> Option<usize> {
        let ts = attachment.reference_timestamp()?;
        movements
            .iter()
            .position(|m| m.timestamp.as_deref() == Some(ts))
    }
}

/// First movement on the same calendar day.
pub struct SameDay;

impl MatchTier for SameDay {
    fn name(&self) -> &'static str {
        "same_day"
    }

    fn locate(&self, attachment: &Attachment, movements: &[Movement]) -> Option<usize> {
        let day = attachment.day()?;
        movements.iter().position(|m| m.day() == Some(day))
    }
}

/// Count of attachments placed by one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCount {
    pub tier: &'static str,
    pub matched: usize,
}

/// Outcome of one association pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationReport {
    /// One entry per tier, in tier order.
    pub per_tier: Vec<TierCount>,
    pub unmatched: usize,
}

impl AssociationReport {
    pub fn matched(&self) -> usize {
        self.per_tier.iter().map(|t| t.matched).sum()
    }
}

/// Runs attachments through an ordered list of tiers.
pub struct Associator {
    tiers: Vec<Box<dyn MatchTier>>,
}

impl Default for Associator {
    fn default() -> Self {
        Self::standard()
    }
}

impl Associator {
    /// Direct id, then exact instant, then same day.
    pub fn standard() -> Self {
        Self::with_tiers(vec![Box::new(DirectId), Box::new(ExactInstant), Box::new(SameDay)])
    }

    /// Direct id only, for sources that always carry the foreign key.
    pub fn strict() -> Self {
        Self::with_tiers(vec![Box::new(DirectId)])
    }

    pub fn with_tiers(tiers: Vec<Box<dyn MatchTier>>) -> Self {
        Self { tiers }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Push a copy of each attachment onto the movement it matches.
    pub fn associate(
        &self,
        movements: &mut [Movement],
        attachments: &[Attachment],
    ) -> AssociationReport {
        let mut per_tier: Vec<TierCount> = self
            .tiers
            .iter()
            .map(|t| TierCount {
                tier: t.name(),
                matched: 0,
            })
            .collect();
        let mut unmatched = 0;

        for attachment in attachments {
            let hit = self
                .tiers
                .iter()
                .enumerate()
                .find_map(|(i, tier)| tier.locate(attachment, movements).map(|idx| (i, idx)));
            match hit {
                Some((tier_idx, movement_idx)) => {
                    per_tier[tier_idx].matched += 1;
                    movements[movement_idx].attachments.push(attachment.clone());
                }
                None => unmatched += 1,
            }
        }

        let report = AssociationReport {
            per_tier,
            unmatched,
        };
        debug!(
            attachments = attachments.len(),
            matched = report.matched(),
            unmatched = report.unmatched,
            "associated attachments with movements"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(id: &str, ts: Option<&str>) -> Movement {
        Movement {
            id: id.into(),
            timestamp: ts.map(Into::into),
            kind: None,
            publication_kind: None,
            content: None,
            predicted_classification: None,
            source: None,
            confidential: None,
            crawl_id: None,
            registered_at: None,
            attachments: Vec::new(),
        }
    }

    fn attachment(id: &str, movement_id: Option<&str>, ts: Option<&str>) -> Attachment {
        Attachment {
            id: Some(id.into()),
            movement_id: movement_id.map(Into::into),
            name: None,
            kind: None,
            registered_at: ts.map(Into::into),
            movement_timestamp: None,
            venue_instance: None,
            crawl_id: None,
        }
    }

    fn attached_ids(m: &Movement) -> Vec<&str> {
        m.attachments.iter().filter_map(|a| a.id.as_deref()).collect()
    }

    #[test]
    fn direct_id_beats_timestamp() {
        let mut ms = vec![
            movement("m1", Some("2024-03-10T08:00:00.000Z")),
            movement("m2", Some("2024-03-11T08:00:00.000Z")),
        ];
        let atts = vec![attachment("a1", Some("m2"), Some("2024-03-10T08:00:00.000Z"))];
        let report = Associator::standard().associate(&mut ms, &atts);
        assert!(ms[0].attachments.is_empty());
        assert_eq!(attached_ids(&ms[1]), vec!["a1"]);
        assert_eq!(report.per_tier[0].matched, 1);
    }

    #[test]
    fn exact_instant_beats_same_day() {
        let mut ms = vec![
            movement("m1", Some("2024-03-10T08:00:00.000Z")),
            movement("m2", Some("2024-03-10T20:00:00.000Z")),
        ];
        let atts = vec![attachment("a1", None, Some("2024-03-10T20:00:00.000Z"))];
        Associator::standard().associate(&mut ms, &atts);
        assert_eq!(attached_ids(&ms[1]), vec!["a1"]);
    }

    #[test]
    fn shared_instant_goes_to_first_encountered() {
        let mut ms = vec![
            movement("m1", Some("2024-03-10T08:00:00.000Z")),
            movement("m2", Some("2024-03-10T08:00:00.000Z")),
        ];
        let atts = vec![attachment("a1", None, Some("2024-03-10T08:00:00.000Z"))];
        Associator::standard().associate(&mut ms, &atts);
        assert_eq!(attached_ids(&ms[0]), vec!["a1"]);
        assert!(ms[1].attachments.is_empty());
    }

    #[test]
    fn same_day_fallback_takes_first_in_order() {
        let mut ms = vec![
            movement("m1", Some("2024-03-10T08:00:00.000Z")),
            movement("m2", Some("2024-03-10T20:00:00.000Z")),
        ];
        let atts = vec![attachment("a1", None, Some("2024-03-10T00:00:00.000Z"))];
        let report = Associator::standard().associate(&mut ms, &atts);
        assert_eq!(attached_ids(&ms[0]), vec!["a1"]);
        assert_eq!(report.per_tier[2].tier, "same_day");
        assert_eq!(report.per_tier[2].matched, 1);
    }

    #[test]
    fn unknown_movement_id_falls_through_to_timestamp() {
        let mut ms = vec![movement("m1", Some("2024-03-10T08:00:00.000Z"))];
        let atts = vec![attachment("a1", Some("gone"), Some("2024-03-10T08:00:00.000Z"))];
        let report = Associator::standard().associate(&mut ms, &atts);
        assert_eq!(attached_ids(&ms[0]), vec!["a1"]);
        assert_eq!(report.per_tier[1].matched, 1);
    }

    #[test]
    fn unmatched_attachments_are_counted_not_nested() {
        let mut ms = vec![movement("m1", Some("2024-03-10T08:00:00.000Z"))];
        let atts = vec![
            attachment("a1", None, Some("2024-04-01T00:00:00.000Z")),
            attachment("a2", None, None),
        ];
        let report = Associator::standard().associate(&mut ms, &atts);
        assert!(ms[0].attachments.is_empty());
        assert_eq!(report.unmatched, 2);
        assert_eq!(report.matched(), 0);
    }

    #[test]
    fn strict_skips_heuristics() {
        let mut ms = vec![movement("m1", Some("2024-03-10T08:00:00.000Z"))];
        let atts = vec![attachment("a1", None, Some("2024-03-10T08:00:00.000Z"))];
        let assoc = Associator::strict();
        assert_eq!(assoc.tier_names(), vec!["direct_id"]);
        let report = assoc.associate(&mut ms, &atts);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn custom_tier_list() {
        struct LastOnSameDay;
        impl MatchTier for LastOnSameDay {
            fn name(&self) -> &'static str {
                "last_same_day"
            }
            fn locate(&self, a: &Attachment, ms: &[Movement]) -> Option<usize> {
                let day = a.day()?;
                ms.iter().rposition(|m| m.day() == Some(day))
            }
        }

        let mut ms = vec![
            movement("m1", Some("2024-03-10T08:00:00.000Z")),
            movement("m2", Some("2024-03-10T20:00:00.000Z")),
        ];
        let atts = vec![attachment("a1", None, Some("2024-03-10T00:00:00.000Z"))];
        Associator::with_tiers(vec![Box::new(DirectId), Box::new(LastOnSameDay)])
            .associate(&mut ms, &atts);
        assert_eq!(attached_ids(&ms[1]), vec!["a1"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn id_matched_attachment_lands_only_under_its_movement(
                movement_count in 1usize..8,
                targets in proptest::collection::vec(0usize..8, 1..12),
            ) {
                let mut ms: Vec<Movement> = (0..movement_count)
                    .map(|i| movement(&format!("m{i}"), Some("2024-03-10T08:00:00.000Z")))
                    .collect();
                let atts: Vec<Attachment> = targets
                    .iter()
                    .enumerate()
                    .map(|(j, t)| {
                        let target = format!("m{}", t % movement_count);
                        attachment(&format!("a{j}"), Some(&target), Some("2024-03-10T08:00:00.000Z"))
                    })
                    .collect();
                Associator::standard().associate(&mut ms, &atts);
                for a in &atts {
                    let owners: Vec<&str> = ms
                        .iter()
                        .filter(|m| m.attachments.iter().any(|x| x.id == a.id))
                        .map(|m| m.id.as_str())
                        .collect();
                    prop_assert_eq!(owners, vec![a.movement_id.as_deref().unwrap()]);
                }
            }
        }
    }
}
