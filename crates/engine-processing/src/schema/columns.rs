use engine_config::job::DataSource;
use model::{
    core::data_type::DataType,
    mapping::column::ColumnInfo,
    records::row::RawColumn,
};

/// Column layout of a data source: the raw columns in result order, then one
/// calculated column per field with a destination.
///
/// Calculated indices continue after the last raw index. A calculated column
/// reads from the raw column whose name matches its field's source,
/// ignoring case; it has no source index when nothing matches.
pub fn resolve_columns(raw: &[RawColumn], data_source: &DataSource, key_column: &str) -> Vec<ColumnInfo> {
    let mut columns: Vec<ColumnInfo> = raw
        .iter()
        .enumerate()
        .map(|(index, column)| {
            ColumnInfo::raw(
                index,
                &column.name,
                column.data_type.clone(),
                column.name.eq_ignore_ascii_case(key_column),
            )
        })
        .collect();

    let mut next_index = raw.len();
    for field in data_source.fields.iter() {
        let Some(destination) = &field.destination else {
            continue;
        };
        let source_index = raw
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&field.source));

        columns.push(ColumnInfo {
            index: next_index,
            source_index,
            name: destination.clone(),
            data_type: DataType::Custom(field.transform.to_string()),
            store_type: field.destination_type,
            is_join_column: false,
            is_calculated: true,
            transform: field.transform,
        });
        next_index += 1;
    }

    columns
}
