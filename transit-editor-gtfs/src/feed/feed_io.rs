use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use super::FeedTables;
use crate::gtfs_error::GtfsError;

pub const AGENCY_FILE: &str = "agency.txt";
pub const STOPS_FILE: &str = "stops.txt";
pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const CALENDAR_FILE: &str = "calendar.txt";
pub const CALENDAR_DATES_FILE: &str = "calendar_dates.txt";
pub const SHAPES_FILE: &str = "shapes.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.txt";
pub const FARE_ATTRIBUTES_FILE: &str = "fare_attributes.txt";
pub const FARE_RULES_FILE: &str = "fare_rules.txt";
pub const FEED_INFO_FILE: &str = "feed_info.txt";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// where GTFS files are read from.
enum FeedSource {
    Directory(PathBuf),
    Archive(ZipArchive<File>),
}

impl FeedSource {
    fn open(path: &Path) -> Result<FeedSource, GtfsError> {
        if path.is_dir() {
            return Ok(FeedSource::Directory(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| GtfsError::ReadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let archive = ZipArchive::new(file).map_err(|e| GtfsError::ReadError {
            path: path.to_path_buf(),
            message: format!("not a GTFS directory or zip archive: {e}"),
        })?;
        Ok(FeedSource::Archive(archive))
    }

    /// contents of a GTFS file, or None when the feed does not contain it.
    /// archives that nest their files in a single folder are accepted.
    fn read_file(&mut self, path: &Path, filename: &str) -> Result<Option<Vec<u8>>, GtfsError> {
        let read_error = |message: String| GtfsError::ReadError {
            path: path.join(filename),
            message,
        };
        let mut bytes = vec![];
        match self {
            FeedSource::Directory(dir) => {
                let filepath = dir.join(filename);
                if !filepath.is_file() {
                    return Ok(None);
                }
                File::open(&filepath)
                    .and_then(|mut f| f.read_to_end(&mut bytes))
                    .map_err(|e| read_error(e.to_string()))?;
            }
            FeedSource::Archive(archive) => {
                let suffix = format!("/{filename}");
                let entry_name = archive
                    .file_names()
                    .find(|name| *name == filename || name.ends_with(&suffix))
                    .map(String::from);
                let Some(entry_name) = entry_name else {
                    return Ok(None);
                };
                let mut entry = archive
                    .by_name(&entry_name)
                    .map_err(|e| read_error(e.to_string()))?;
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| read_error(e.to_string()))?;
            }
        }
        Ok(Some(bytes))
    }
}

/// reads a GTFS feed from a directory or a zip archive.
///
/// # Arguments
///
/// * `path` - directory holding the GTFS text files, or a zip archive of them
///
/// # Returns
///
/// the parsed tables. agency, stops, routes, trips and stop_times are required,
/// along with at least one of calendar and calendar_dates.
pub fn read_canonical_feed(path: &Path) -> Result<FeedTables, GtfsError> {
    let mut source = FeedSource::open(path)?;
    let mut read = |filename: &str| source.read_file(path, filename);

    let required = |filename: &str, bytes: Option<Vec<u8>>| {
        bytes.ok_or_else(|| GtfsError::MalformedGtfs(format!("feed is missing {filename}")))
    };

    let agencies = parse_table(AGENCY_FILE, &required(AGENCY_FILE, read(AGENCY_FILE)?)?)?;
    let stops = parse_table(STOPS_FILE, &required(STOPS_FILE, read(STOPS_FILE)?)?)?;
    let routes = parse_table(ROUTES_FILE, &required(ROUTES_FILE, read(ROUTES_FILE)?)?)?;
    let trips = parse_table(TRIPS_FILE, &required(TRIPS_FILE, read(TRIPS_FILE)?)?)?;
    let stop_times = parse_table(
        STOP_TIMES_FILE,
        &required(STOP_TIMES_FILE, read(STOP_TIMES_FILE)?)?,
    )?;
    let calendar_bytes = read(CALENDAR_FILE)?;
    let calendar_dates_bytes = read(CALENDAR_DATES_FILE)?;
    if calendar_bytes.is_none() && calendar_dates_bytes.is_none() {
        return Err(GtfsError::MalformedGtfs(format!(
            "feed has neither {CALENDAR_FILE} nor {CALENDAR_DATES_FILE}"
        )));
    }
    let tables = FeedTables {
        agencies,
        stops,
        routes,
        trips,
        stop_times,
        calendars: parse_optional_table(CALENDAR_FILE, calendar_bytes)?,
        calendar_dates: parse_optional_table(CALENDAR_DATES_FILE, calendar_dates_bytes)?,
        shapes: parse_optional_table(SHAPES_FILE, read(SHAPES_FILE)?)?,
        frequencies: parse_optional_table(FREQUENCIES_FILE, read(FREQUENCIES_FILE)?)?,
        fare_attributes: parse_optional_table(
            FARE_ATTRIBUTES_FILE,
            read(FARE_ATTRIBUTES_FILE)?,
        )?,
        fare_rules: parse_optional_table(FARE_RULES_FILE, read(FARE_RULES_FILE)?)?,
        feed_info: parse_optional_table(FEED_INFO_FILE, read(FEED_INFO_FILE)?)?,
    };
    log::info!(
        "read GTFS feed {}: {} agencies, {} stops, {} routes, {} trips, {} stop times",
        path.display(),
        tables.agencies.len(),
        tables.stops.len(),
        tables.routes.len(),
        tables.trips.len(),
        tables.stop_times.len()
    );
    Ok(tables)
}

/// writes a GTFS feed. paths ending in `.zip` produce an archive, anything else
/// is treated as a directory ("mkdir -p"). tables without rows are not written.
pub fn write_canonical_feed(tables: &FeedTables, path: &Path) -> Result<(), GtfsError> {
    let files: Vec<(&str, Vec<u8>)> = vec![
        (AGENCY_FILE, serialize_table(AGENCY_FILE, &tables.agencies)?),
        (STOPS_FILE, serialize_table(STOPS_FILE, &tables.stops)?),
        (ROUTES_FILE, serialize_table(ROUTES_FILE, &tables.routes)?),
        (TRIPS_FILE, serialize_table(TRIPS_FILE, &tables.trips)?),
        (STOP_TIMES_FILE, serialize_table(STOP_TIMES_FILE, &tables.stop_times)?),
        (CALENDAR_FILE, serialize_table(CALENDAR_FILE, &tables.calendars)?),
        (
            CALENDAR_DATES_FILE,
            serialize_table(CALENDAR_DATES_FILE, &tables.calendar_dates)?,
        ),
        (SHAPES_FILE, serialize_table(SHAPES_FILE, &tables.shapes)?),
        (
            FREQUENCIES_FILE,
            serialize_table(FREQUENCIES_FILE, &tables.frequencies)?,
        ),
        (
            FARE_ATTRIBUTES_FILE,
            serialize_table(FARE_ATTRIBUTES_FILE, &tables.fare_attributes)?,
        ),
        (FARE_RULES_FILE, serialize_table(FARE_RULES_FILE, &tables.fare_rules)?),
        (FEED_INFO_FILE, serialize_table(FEED_INFO_FILE, &tables.feed_info)?),
    ];
    let files = files
        .into_iter()
        .filter(|(_, bytes)| !bytes.is_empty())
        .collect::<Vec<_>>();

    let write_error = |message: String| GtfsError::WriteError {
        path: path.to_path_buf(),
        message,
    };
    let is_zip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if is_zip {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let file = File::create(path).map_err(|e| write_error(e.to_string()))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (filename, bytes) in files.iter() {
            writer
                .start_file(*filename, options)
                .map_err(|e| write_error(format!("{filename}: {e}")))?;
            writer
                .write_all(bytes)
                .map_err(|e| write_error(format!("{filename}: {e}")))?;
        }
        writer.finish().map_err(|e| write_error(e.to_string()))?;
    } else {
        std::fs::create_dir_all(path).map_err(|e| write_error(e.to_string()))?;
        for (filename, bytes) in files.iter() {
            std::fs::write(path.join(filename), bytes)
                .map_err(|e| write_error(format!("{filename}: {e}")))?;
        }
    }
    log::info!("wrote {} GTFS files to {}", files.len(), path.display());
    Ok(())
}

fn parse_table<T: DeserializeOwned>(filename: &str, bytes: &[u8]) -> Result<Vec<T>, GtfsError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes)
        .into_deserialize::<T>()
        .enumerate()
        .map(|(idx, row)| {
            // row 1 is the header
            row.map_err(|e| GtfsError::MalformedGtfs(format!("{filename} row {}: {e}", idx + 2)))
        })
        .collect()
}

fn parse_optional_table<T: DeserializeOwned>(
    filename: &str,
    bytes: Option<Vec<u8>>,
) -> Result<Vec<T>, GtfsError> {
    match bytes {
        Some(bytes) => parse_table(filename, &bytes),
        None => Ok(vec![]),
    }
}

fn serialize_table<T: Serialize>(filename: &str, rows: &[T]) -> Result<Vec<u8>, GtfsError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(vec![]);
    for row in rows.iter() {
        writer
            .serialize(row)
            .map_err(|e| GtfsError::Internal(format!("failure serializing {filename}: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| GtfsError::Internal(format!("failure serializing {filename}: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::feed::records::*;
    use chrono::NaiveDate;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "transit-editor-gtfs-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::remove_file(&dir);
        dir
    }

    fn write_file(dir: &Path, filename: &str, contents: &str) {
        std::fs::write(dir.join(filename), contents).unwrap();
    }

    fn minimal_feed_dir(name: &str) -> PathBuf {
        let dir = temp_path(name);
        std::fs::create_dir_all(&dir).unwrap();
        write_file(
            &dir,
            AGENCY_FILE,
            "\u{feff}agency_id,agency_name,agency_url,agency_timezone\nA1,Metro,http://metro.example,America/Denver\n",
        );
        write_file(
            &dir,
            STOPS_FILE,
            "stop_id,stop_name,stop_lat,stop_lon\nS1,First,40.0,-105.0\nS2, Second ,40.01,-105.0\n",
        );
        write_file(
            &dir,
            ROUTES_FILE,
            "route_id,agency_id,route_short_name,route_long_name,route_type\nR1,A1,1,,3\n",
        );
        write_file(
            &dir,
            TRIPS_FILE,
            "route_id,service_id,trip_id,direction_id\nR1,WK,T1,0\n",
        );
        write_file(
            &dir,
            STOP_TIMES_FILE,
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,07:00:00,07:00:00,S1,1\nT1,,,S2,2\n",
        );
        write_file(
            &dir,
            CALENDAR_DATES_FILE,
            "service_id,date,exception_type\nWK,20240701,1\n",
        );
        dir
    }

    #[test]
    fn test_read_directory() {
        let dir = minimal_feed_dir("read");
        let tables = read_canonical_feed(&dir).unwrap();
        assert_eq!(tables.agencies[0].agency_id.as_deref(), Some("A1"));
        assert_eq!(tables.stops[1].stop_name.as_deref(), Some("Second"));
        assert_eq!(tables.routes[0].route_long_name, None);
        assert_eq!(tables.stop_times[0].arrival_time, Some(7 * 3600));
        assert_eq!(tables.stop_times[1].arrival_time, None);
        assert_eq!(
            tables.calendar_dates[0].date,
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
        );
        assert!(tables.calendars.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_required_file() {
        let dir = minimal_feed_dir("missing");
        std::fs::remove_file(dir.join(STOPS_FILE)).unwrap();
        match read_canonical_feed(&dir) {
            Err(GtfsError::MalformedGtfs(msg)) => assert!(msg.contains(STOPS_FILE)),
            other => panic!("expected malformed feed error, found {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_zip_archive_matches_directory() {
        let dir = minimal_feed_dir("zip-source");
        let tables = read_canonical_feed(&dir).unwrap();
        let archive = temp_path("zip-out").with_extension("zip");
        write_canonical_feed(&tables, &archive).unwrap();
        let from_zip = read_canonical_feed(&archive).unwrap();
        assert_eq!(from_zip, tables);
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::remove_file(&archive);
    }

    #[test]
    fn test_write_skips_empty_tables() {
        let out = temp_path("write-dir");
        let tables = FeedTables {
            calendars: vec![CalendarRecord {
                service_id: String::from("WK"),
                monday: 1,
                tuesday: 1,
                wednesday: 1,
                thursday: 1,
                friday: 1,
                saturday: 0,
                sunday: 0,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            }],
            ..Default::default()
        };
        write_canonical_feed(&tables, &out).unwrap();
        let written = std::fs::read_to_string(out.join(CALENDAR_FILE)).unwrap();
        assert_eq!(
            written,
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nWK,1,1,1,1,1,0,0,20240101,20241231\n"
        );
        assert!(!out.join(SHAPES_FILE).exists());
        let _ = std::fs::remove_dir_all(&out);
    }
}
