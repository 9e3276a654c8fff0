use engine_config::job::{DataSource, RangeSettings};
use engine_processing::item::SqlImportItem;
use model::{core::value::Value, mapping::item::MappingItem, records::range::KeyRange};
use serde::Serialize;
use std::{cmp::Ordering, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("No key ranges configured")]
    Empty,

    #[error("Range {index} starts after it ends: {range}")]
    Inverted { index: usize, range: KeyRange },

    #[error("Range {index} has bounds of different types: {range}")]
    Incomparable { index: usize, range: KeyRange },

    #[error("Slice size must be positive, got {0}")]
    SliceSize(i64),
}

/// One disjoint slice of the join-key domain and the batch number shared by
/// every data source read over it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSlice {
    pub batch_number: u64,
    pub start: Value,
    pub end: Value,
}

impl RangeSlice {
    pub fn range(&self) -> KeyRange {
        KeyRange::new(self.start.clone(), self.end.clone())
    }
}

/// Explicit ranges in file order, then the key span split into contiguous
/// slices. Batch numbers start at 1. Overlap between ranges is not checked.
pub fn plan_ranges(settings: &RangeSettings) -> Result<Vec<RangeSlice>, PlanError> {
    let mut ranges: Vec<KeyRange> = settings
        .explicit
        .iter()
        .map(|(start, end)| KeyRange::new(Value::from(start), Value::from(end)))
        .collect();

    if let Some(span) = settings.key_range {
        if span.slice_size <= 0 {
            return Err(PlanError::SliceSize(span.slice_size));
        }
        if span.start > span.end {
            return Err(PlanError::Inverted {
                index: ranges.len(),
                range: KeyRange::new(span.start, span.end),
            });
        }

        let mut start = span.start;
        loop {
            let end = start
                .checked_add(span.slice_size - 1)
                .map_or(span.end, |end| end.min(span.end));
            ranges.push(KeyRange::new(start, end));
            if end >= span.end {
                break;
            }
            start = end + 1;
        }
    }

    if ranges.is_empty() {
        return Err(PlanError::Empty);
    }

    ranges
        .into_iter()
        .enumerate()
        .map(|(index, range)| match range.start.compare(&range.end) {
            None => Err(PlanError::Incomparable { index, range }),
            Some(Ordering::Greater) => Err(PlanError::Inverted { index, range }),
            Some(_) => Ok(RangeSlice {
                batch_number: index as u64 + 1,
                start: range.start,
                end: range.end,
            }),
        })
        .collect()
}

/// One import item per slice and data source, slice by slice. `mappings`
/// holds the probed layout of each data source, in the same order.
pub fn import_items(
    slices: &[RangeSlice],
    data_sources: &[DataSource],
    mappings: &[MappingItem],
    seed: u64,
) -> Vec<SqlImportItem> {
    let sources: Vec<(Arc<DataSource>, Arc<MappingItem>)> = data_sources
        .iter()
        .zip(mappings)
        .map(|(data_source, mapping)| (Arc::new(data_source.clone()), Arc::new(mapping.clone())))
        .collect();

    slices
        .iter()
        .flat_map(|slice| {
            sources.iter().map(move |(data_source, mapping)| SqlImportItem {
                query_id: data_source.query_id(),
                data_source: data_source.clone(),
                mapping: mapping.clone(),
                range: slice.range(),
                seed,
                batch_number: slice.batch_number,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::job::{KeySpan, RangeBound};

    fn span(start: i64, end: i64, slice_size: i64) -> RangeSettings {
        RangeSettings {
            explicit: Vec::new(),
            key_range: Some(KeySpan {
                start,
                end,
                slice_size,
            }),
        }
    }

    fn bounds(slices: &[RangeSlice]) -> Vec<(Value, Value)> {
        slices
            .iter()
            .map(|s| (s.start.clone(), s.end.clone()))
            .collect()
    }

    #[test]
    fn splits_span_into_contiguous_slices() {
        let slices = plan_ranges(&span(1, 10, 4)).unwrap();

        assert_eq!(
            bounds(&slices),
            vec![
                (Value::Int(1), Value::Int(4)),
                (Value::Int(5), Value::Int(8)),
                (Value::Int(9), Value::Int(10)),
            ]
        );
        assert_eq!(
            slices.iter().map(|s| s.batch_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn span_near_the_integer_limit_terminates() {
        let slices = plan_ranges(&span(i64::MAX - 2, i64::MAX, 10)).unwrap();
        assert_eq!(
            bounds(&slices),
            vec![(Value::Int(i64::MAX - 2), Value::Int(i64::MAX))]
        );
    }

    #[test]
    fn explicit_ranges_come_first() {
        let settings = RangeSettings {
            explicit: vec![(RangeBound::Text("A".into()), RangeBound::Text("M".into()))],
            key_range: Some(KeySpan {
                start: 1,
                end: 2,
                slice_size: 5,
            }),
        };

        let slices = plan_ranges(&settings).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].start, Value::from("A"));
        assert_eq!(slices[1].batch_number, 2);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert_eq!(plan_ranges(&RangeSettings::default()), Err(PlanError::Empty));
        assert_eq!(plan_ranges(&span(1, 10, 0)), Err(PlanError::SliceSize(0)));
        assert!(matches!(
            plan_ranges(&span(10, 1, 5)),
            Err(PlanError::Inverted { .. })
        ));

        let mixed = RangeSettings {
            explicit: vec![(RangeBound::Int(1), RangeBound::Text("Z".into()))],
            key_range: None,
        };
        assert!(matches!(
            plan_ranges(&mixed),
            Err(PlanError::Incomparable { index: 0, .. })
        ));
    }

    #[test]
    fn every_source_gets_every_slice() {
        let source = |n: usize| DataSource {
            sequence_number: n,
            sql: format!("SELECT {n}"),
            path: String::new(),
            property_type: Default::default(),
            fields: Vec::new(),
        };
        let slices = plan_ranges(&span(1, 4, 2)).unwrap();

        let mapping = |n: usize| MappingItem {
            sequence_number: n,
            property_path: String::new(),
            property_type: Default::default(),
            columns: Vec::new(),
        };

        let items = import_items(&slices, &[source(1), source(2)], &[mapping(1), mapping(2)], 42);

        let keys: Vec<_> = items
            .iter()
            .map(|i| (i.query_id.as_str(), i.batch_number))
            .collect();
        assert_eq!(keys, vec![("q1", 1), ("q2", 1), ("q1", 2), ("q2", 2)]);
        assert!(items.iter().all(|i| i.seed == 42));
        assert!(
            items
                .iter()
                .all(|i| i.mapping.sequence_number == i.data_source.sequence_number)
        );
        assert!(Arc::ptr_eq(&items[0].mapping, &items[2].mapping));
    }
}
