use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

// ============================================================================
// Collection Aggregator
// ============================================================================
//
// A join into a one-to-many relation returns one row per (parent, child)
// pair. Folding collapses those rows back into one parent per identity:
//
// - parents come out in first-seen order
// - children are appended in row arrival order, never re-sorted
// - a parent is built once, from the first row that mentions it
//
// ============================================================================

/// Fold joined rows into de-duplicated parents.
///
/// `make_parent` runs once per distinct key, on the first row carrying it.
/// `append_child` runs for every row, including that first one, and may
/// decide the row has no child (e.g. a left join with no match).
pub fn fold<R, K, P, E>(
    rows: impl IntoIterator<Item = R>,
    mut parent_key: impl FnMut(&R) -> Result<K, E>,
    mut make_parent: impl FnMut(&R) -> Result<P, E>,
    mut append_child: impl FnMut(&mut P, &R) -> Result<(), E>,
) -> Result<Vec<P>, E>
where
    K: Eq + Hash,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut parents: Vec<P> = Vec::new();

    for row in rows {
        let slot = match index.entry(parent_key(&row)?) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                parents.push(make_parent(&row)?);
                *entry.insert(parents.len() - 1)
            }
        };

        append_child(&mut parents[slot], &row)?;
    }

    Ok(parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Debug, PartialEq)]
    struct Parent {
        id: u32,
        label: String,
        children: Vec<&'static str>,
    }

    type JoinRow = (u32, &'static str, Option<&'static str>);

    fn fold_rows(rows: Vec<JoinRow>) -> Vec<Parent> {
        fold(
            rows,
            |row| Ok::<_, Infallible>(row.0),
            |row| {
                Ok(Parent {
                    id: row.0,
                    label: row.1.to_string(),
                    children: Vec::new(),
                })
            },
            |parent, row| {
                if let Some(child) = row.2 {
                    parent.children.push(child);
                }
                Ok(())
            },
        )
        .unwrap()
    }

    #[test]
    fn test_two_parents_three_children_each() {
        let rows = vec![
            (1, "first", Some("a1")),
            (1, "first", Some("a2")),
            (1, "first", Some("a3")),
            (2, "second", Some("b1")),
            (2, "second", Some("b2")),
            (2, "second", Some("b3")),
        ];

        let parents = fold_rows(rows);

        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].id, 1);
        assert_eq!(parents[0].children, vec!["a1", "a2", "a3"]);
        assert_eq!(parents[1].id, 2);
        assert_eq!(parents[1].children, vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_interleaved_rows_keep_first_seen_order() {
        let rows = vec![
            (7, "seven", Some("x")),
            (3, "three", Some("p")),
            (7, "seven", Some("y")),
            (3, "three", Some("q")),
        ];

        let parents = fold_rows(rows);

        assert_eq!(
            parents.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![7, 3]
        );
        assert_eq!(parents[0].children, vec!["x", "y"]);
        assert_eq!(parents[1].children, vec!["p", "q"]);
    }

    #[test]
    fn test_parent_built_from_first_row_only() {
        let rows = vec![(1, "original", Some("a")), (1, "later", Some("b"))];

        let parents = fold_rows(rows);

        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].label, "original");
    }

    #[test]
    fn test_parent_without_children() {
        let parents = fold_rows(vec![(4, "lonely", None)]);

        assert_eq!(parents.len(), 1);
        assert!(parents[0].children.is_empty());
    }

    #[test]
    fn test_error_stops_folding() {
        let result: Result<Vec<u32>, &str> = fold(
            vec![1u32, 2, 3],
            |row| Ok(*row),
            |row| if *row == 2 { Err("bad row") } else { Ok(*row) },
            |_, _| Ok(()),
        );

        assert_eq!(result, Err("bad row"));
    }

    #[test]
    fn test_empty_input() {
        assert!(fold_rows(Vec::new()).is_empty());
    }
}
