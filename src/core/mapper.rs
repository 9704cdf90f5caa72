use crate::domain::model::{ColumnIndex, Record};
use crate::utils::error::{ImportError, Result};

/// Projects the configured columns of a split line into a [`Record`].
///
/// Field values are copied verbatim. An index past the end of `fields`
/// yields [`ImportError::MalformedLineError`].
pub fn map_fields<S: AsRef<str>>(fields: &[S], columns: &ColumnIndex) -> Result<Record> {
    let field = |index: usize| -> Result<String> {
        fields
            .get(index)
            .map(|f| f.as_ref().to_string())
            .ok_or(ImportError::MalformedLineError {
                index,
                field_count: fields.len(),
            })
    };

    Ok(Record {
        transaction_id: field(columns.transaction_id)?,
        transaction_date: field(columns.transaction_date)?,
        first_name: field(columns.first_name)?,
        last_name: field(columns.last_name)?,
    })
}
