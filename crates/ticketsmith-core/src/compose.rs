//! Deterministic merge ordering for textbox and checkbox collections.
//!
//! Form construction, tabular listings, and print composition all walk a
//! template's (or ticket's) two field collections in one combined order.
//! They must agree, so the interleaving lives here and nowhere else.

/// Anything carrying a merge priority. Implemented by field definitions and
/// by their filled ticket counterparts so one merge serves both.
pub trait Prioritized {
    fn priority(&self) -> u32;
}

/// One element of the combined order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merged<'a, T, C> {
    Textbox(&'a T),
    Checkbox(&'a C),
}

impl<T: Prioritized, C: Prioritized> Merged<'_, T, C> {
    #[must_use]
    pub fn priority(&self) -> u32 {
        match self {
            Self::Textbox(t) => t.priority(),
            Self::Checkbox(c) => c.priority(),
        }
    }
}

/// Merge two priority-sorted collections into one combined order.
///
/// Both inputs must already be sorted ascending by priority; keeping them
/// sorted is the owning aggregate's job. Two cursors advance through the
/// inputs: the textbox side is emitted while its priority is strictly
/// smaller, the checkbox side wins ties, and whichever side remains after
/// the other is exhausted is appended as-is. Total over any inputs,
/// including empty ones.
#[must_use]
pub fn merge_by_priority<'a, T, C>(textboxes: &'a [T], checkboxes: &'a [C]) -> Vec<Merged<'a, T, C>>
where
    T: Prioritized,
    C: Prioritized,
{
    let mut combined = Vec::with_capacity(textboxes.len() + checkboxes.len());
    let mut i = 0;
    let mut j = 0;
    while i < textboxes.len() || j < checkboxes.len() {
        if i == textboxes.len() {
            combined.push(Merged::Checkbox(&checkboxes[j]));
            j += 1;
        } else if j == checkboxes.len() {
            combined.push(Merged::Textbox(&textboxes[i]));
            i += 1;
        } else if textboxes[i].priority() < checkboxes[j].priority() {
            combined.push(Merged::Textbox(&textboxes[i]));
            i += 1;
        } else {
            combined.push(Merged::Checkbox(&checkboxes[j]));
            j += 1;
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug)]
    struct P(u32);

    impl Prioritized for P {
        fn priority(&self) -> u32 {
            self.0
        }
    }

    fn ps(values: &[u32]) -> Vec<P> {
        values.iter().copied().map(P).collect()
    }

    #[test]
    fn test_merge_empty_inputs() {
        let none: Vec<P> = Vec::new();
        assert!(merge_by_priority(&none, &none).is_empty());
        let some = ps(&[1, 2]);
        assert_eq!(merge_by_priority(&some, &none).len(), 2);
        assert_eq!(merge_by_priority(&none, &some).len(), 2);
    }

    #[test]
    fn test_checkbox_wins_ties() {
        let textboxes = ps(&[3]);
        let checkboxes = ps(&[3]);
        let merged = merge_by_priority(&textboxes, &checkboxes);
        assert!(matches!(merged[0], Merged::Checkbox(_)));
        assert!(matches!(merged[1], Merged::Textbox(_)));
    }

    #[test]
    fn test_interleaves_by_priority() {
        // Textboxes at 2 and 5, checkbox at 3: combined order 2, 3, 5.
        let textboxes = ps(&[2, 5]);
        let checkboxes = ps(&[3]);
        let merged = merge_by_priority(&textboxes, &checkboxes);
        let priorities: Vec<u32> = merged.iter().map(Merged::priority).collect();
        assert_eq!(priorities, vec![2, 3, 5]);
        assert!(matches!(merged[0], Merged::Textbox(_)));
        assert!(matches!(merged[1], Merged::Checkbox(_)));
        assert!(matches!(merged[2], Merged::Textbox(_)));
    }

    proptest! {
        #[test]
        fn merge_is_nondecreasing_and_complete(
            mut a in proptest::collection::vec(0u32..=1000, 0..32),
            mut b in proptest::collection::vec(0u32..=1000, 0..32),
        ) {
            a.sort_unstable();
            b.sort_unstable();
            let textboxes = ps(&a);
            let checkboxes = ps(&b);
            let merged = merge_by_priority(&textboxes, &checkboxes);

            prop_assert_eq!(merged.len(), a.len() + b.len());
            for pair in merged.windows(2) {
                prop_assert!(pair[0].priority() <= pair[1].priority());
            }
        }

        #[test]
        fn merge_preserves_input_order_per_side(
            mut a in proptest::collection::vec(0u32..=1000, 0..32),
            mut b in proptest::collection::vec(0u32..=1000, 0..32),
        ) {
            a.sort_unstable();
            b.sort_unstable();
            let textboxes = ps(&a);
            let checkboxes = ps(&b);
            let merged = merge_by_priority(&textboxes, &checkboxes);

            let from_textboxes: Vec<u32> = merged
                .iter()
                .filter_map(|m| match m {
                    Merged::Textbox(t) => Some(t.priority()),
                    Merged::Checkbox(_) => None,
                })
                .collect();
            let from_checkboxes: Vec<u32> = merged
                .iter()
                .filter_map(|m| match m {
                    Merged::Checkbox(c) => Some(c.priority()),
                    Merged::Textbox(_) => None,
                })
                .collect();
            prop_assert_eq!(from_textboxes, a);
            prop_assert_eq!(from_checkboxes, b);
        }

        #[test]
        fn ties_always_favor_checkboxes(
            priorities in proptest::collection::vec(0u32..=10, 1..16),
        ) {
            // Identical priority lists on both sides: every checkbox at a
            // given priority must appear before every textbox at it.
            let mut sorted = priorities.clone();
            sorted.sort_unstable();
            let textboxes = ps(&sorted);
            let checkboxes = ps(&sorted);
            let merged = merge_by_priority(&textboxes, &checkboxes);
            for pair in merged.windows(2) {
                if pair[0].priority() == pair[1].priority() {
                    let inversion = matches!(
                        (&pair[0], &pair[1]),
                        (Merged::Textbox(_), Merged::Checkbox(_))
                    );
                    prop_assert!(!inversion);
                }
            }
        }
    }
}
