use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

/// One result row as ordered `(column, value)` pairs.
pub type Record = Vec<(String, String)>;

fn value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "null".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

pub fn query_records(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let record_iter = stmt.query_map([], |row| {
        let mut record = Vec::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            record.push((name.clone(), value_to_text(row.get_ref(i)?)));
        }
        Ok(record)
    })?;

    let mut records = Vec::new();
    for record in record_iter {
        records.push(record?);
    }
    Ok(records)
}

pub fn records_to_json(records: &[Record]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|record| {
                let object: Map<String, Value> = record
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(object)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_QUERY;
    use chrono::NaiveDate;
    use lotto_weather::{
        DrawRecord, JoinedResult, Precipitation, ResultStore, SqliteStore, WeatherRecord,
        WindDirection,
    };

    fn store_with_one_result() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let at = |h, m| {
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        let joined = JoinedResult {
            draw: DrawRecord {
                draw_number: 1001,
                draw_time: at(10, 0),
                numbers: [1, 2, 3, 4, 5, 6, 7, 8],
            },
            weather: WeatherRecord {
                observation_time: at(10, 7),
                temperature: 2.5,
                humidity: 75,
                pressure: 752,
                wind_speed: 1.25,
                wind_direction: WindDirection::East,
                precipitation: Precipitation::Fog,
            },
            time_delta_minutes: 7,
        };
        store.replace_all(&[joined]).unwrap();
        store
    }

    #[test]
    fn default_query_reads_the_join_table() {
        let store = store_with_one_result();
        let records = query_records(store.connection(), DEFAULT_QUERY).unwrap();

        assert_eq!(records.len(), 1);
        let get = |name: &str| {
            records[0]
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("draw_number"), Some("1001"));
        assert_eq!(get("wind_direction"), Some("east"));
        assert_eq!(get("time_delta_minutes"), Some("7"));
    }

    #[test]
    fn columns_keep_query_order_and_nulls_render() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records =
            query_records(store.connection(), "SELECT 2 AS b, NULL AS a, 'x' AS c").unwrap();
        assert_eq!(
            records[0],
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "null".to_string()),
                ("c".to_string(), "x".to_string()),
            ]
        );

        let json = records_to_json(&records);
        assert_eq!(json[0]["c"], "x");
    }

    #[test]
    fn bad_sql_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(query_records(store.connection(), "SELECT * FROM nowhere").is_err());
    }
}
