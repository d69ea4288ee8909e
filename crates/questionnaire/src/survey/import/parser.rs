use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One CSV line of a response export, before it is matched to a question.
#[derive(Debug)]
pub(crate) struct ResponseRecord {
    pub(crate) line: usize,
    pub(crate) response: u64,
    pub(crate) question: u64,
    pub(crate) group: Option<u64>,
    pub(crate) choice: Option<String>,
    pub(crate) rank: Option<String>,
    pub(crate) text: Option<String>,
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<ResponseRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<ResponseRow>().enumerate() {
        let row = record?;
        records.push(ResponseRecord {
            // header is line 1
            line: index + 2,
            response: row.response,
            question: row.question,
            group: row.group,
            choice: row.choice,
            rank: row.rank,
            text: row.text,
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct ResponseRow {
    #[serde(rename = "Response")]
    response: u64,
    #[serde(rename = "Question")]
    question: u64,
    #[serde(rename = "Group", default, deserialize_with = "empty_string_as_no_id")]
    group: Option<u64>,
    #[serde(rename = "Choice", default, deserialize_with = "empty_string_as_none")]
    choice: Option<String>,
    #[serde(rename = "Rank", default, deserialize_with = "empty_string_as_none")]
    rank: Option<String>,
    #[serde(rename = "Text", default, deserialize_with = "empty_string_as_none")]
    text: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn empty_string_as_no_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
