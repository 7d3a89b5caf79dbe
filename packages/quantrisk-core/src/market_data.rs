//! Price sources feeding the risk engine.
//!
//! The engine never talks to a market-data vendor directly. Callers hand it a
//! [`PriceSource`]; this module ships an in-memory source and a CSV directory
//! source that reads files in the vendor's `timestamp,open,high,low,close,volume`
//! export layout.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Interval, PriceBar, PriceSeries};
use crate::{Error, Result};

/// Source of historical prices keyed by symbol and interval.
pub trait PriceSource {
    /// Full available history, oldest first.
    ///
    /// Fails with `Error::UnknownSymbol` when the source has no data for `symbol`.
    fn fetch(&self, symbol: &str, interval: Interval) -> Result<PriceSeries>;

    /// History restricted to `[from, to]` inclusive.
    fn fetch_between(
        &self,
        symbol: &str,
        interval: Interval,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceSeries> {
        Ok(self.fetch(symbol, interval)?.between(from, to))
    }

    /// Symbols whose ticker or company name contains `keywords`, best match first.
    ///
    /// No match is an empty list. Blank keywords are rejected.
    fn search(&self, keywords: &str) -> Result<Vec<SymbolMatch>>;
}

/// A symbol-search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolMatch {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Intervals the source holds data for
    pub intervals: Vec<Interval>,
    /// 1.0 for an exact ticker match, lower for partial matches
    pub match_score: f64,
}

/// Score `keywords` against a ticker and optional company name.
///
/// Exact ticker 1.0, ticker prefix 0.8, ticker or name substring 0.5.
fn match_score(keywords: &str, symbol: &str, name: Option<&str>) -> Option<f64> {
    if symbol == keywords {
        Some(1.0)
    } else if symbol.starts_with(keywords) {
        Some(0.8)
    } else if symbol.contains(keywords)
        || name.is_some_and(|n| n.to_uppercase().contains(keywords))
    {
        Some(0.5)
    } else {
        None
    }
}

/// Rank every known symbol against `keywords`.
fn rank_matches<'a>(
    keywords: &str,
    symbols: impl Iterator<Item = (&'a str, Option<&'a str>, Vec<Interval>)>,
) -> Result<Vec<SymbolMatch>> {
    let keywords = normalize(keywords);
    if keywords.is_empty() {
        return Err(Error::invalid("keywords", "must not be blank"));
    }

    let mut matches: Vec<SymbolMatch> = symbols
        .filter_map(|(symbol, name, intervals)| {
            match_score(&keywords, symbol, name).map(|match_score| SymbolMatch {
                symbol: symbol.to_string(),
                name: name.map(str::to_string),
                intervals,
                match_score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.match_score
            .total_cmp(&a.match_score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    debug!(%keywords, hits = matches.len(), "symbol search");
    Ok(matches)
}

/// Price source backed by series already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    series: HashMap<(String, Interval), PriceSeries>,
    names: HashMap<String, String>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series for `symbol` (case-insensitive).
    pub fn insert(&mut self, symbol: &str, interval: Interval, series: PriceSeries) {
        self.series.insert((normalize(symbol), interval), series);
    }

    /// Builder-style variant of [`insert`](Self::insert) for daily data.
    pub fn with_daily(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.insert(symbol, Interval::Daily, series);
        self
    }

    /// Attach a company name used by [`search`](PriceSource::search).
    pub fn with_name(mut self, symbol: &str, name: &str) -> Self {
        self.names.insert(normalize(symbol), name.to_string());
        self
    }

    /// Known symbols with the intervals held for each, in ticker order.
    fn catalog(&self) -> BTreeMap<&str, Vec<Interval>> {
        let mut catalog: BTreeMap<&str, Vec<Interval>> = BTreeMap::new();
        for (symbol, interval) in self.series.keys() {
            catalog.entry(symbol.as_str()).or_default().push(*interval);
        }
        for intervals in catalog.values_mut() {
            intervals.sort_by_key(|i| Interval::ALL.iter().position(|a| a == i));
        }
        catalog
    }
}

impl PriceSource for InMemoryPriceSource {
    fn fetch(&self, symbol: &str, interval: Interval) -> Result<PriceSeries> {
        self.series
            .get(&(normalize(symbol), interval))
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(normalize(symbol)))
    }

    fn search(&self, keywords: &str) -> Result<Vec<SymbolMatch>> {
        let catalog = self.catalog();
        rank_matches(
            keywords,
            catalog.into_iter().map(|(symbol, intervals)| {
                (symbol, self.names.get(symbol).map(String::as_str), intervals)
            }),
        )
    }
}

/// CSV row in the vendor export layout.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Price source reading one CSV file per symbol from a directory.
///
/// Looks for `<SYMBOL>_<interval>.csv` and, for daily data, falls back to
/// `<SYMBOL>.csv`. Rows may be in any order.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn locate(&self, symbol: &str, interval: Interval) -> Option<PathBuf> {
        let symbol = normalize(symbol);
        let mut candidates = vec![self.dir.join(format!("{}_{}.csv", symbol, interval))];
        if interval == Interval::Daily {
            candidates.push(self.dir.join(format!("{}.csv", symbol)));
        }
        candidates.into_iter().find(|p| p.exists())
    }

    /// Symbols with at least one price file, with the intervals on disk.
    ///
    /// `<SYMBOL>.csv` counts as daily data, as does any stem whose suffix is not
    /// an interval tag.
    fn catalog(&self) -> Result<BTreeMap<String, Vec<Interval>>> {
        let mut catalog: BTreeMap<String, Vec<Interval>> = BTreeMap::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let (symbol, interval) = match stem.rsplit_once('_') {
                Some((symbol, tag)) => match tag.parse::<Interval>() {
                    Ok(interval) => (symbol, interval),
                    Err(_) => (stem, Interval::Daily),
                },
                None => (stem, Interval::Daily),
            };

            let intervals = catalog.entry(normalize(symbol)).or_default();
            if !intervals.contains(&interval) {
                intervals.push(interval);
            }
        }
        for intervals in catalog.values_mut() {
            intervals.sort_by_key(|i| Interval::ALL.iter().position(|a| a == i));
        }
        Ok(catalog)
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(&self, symbol: &str, interval: Interval) -> Result<PriceSeries> {
        let path = self
            .locate(symbol, interval)
            .ok_or_else(|| Error::UnknownSymbol(normalize(symbol)))?;

        debug!(path = %path.display(), %interval, "loading price file");
        read_price_csv(&path)
    }

    fn search(&self, keywords: &str) -> Result<Vec<SymbolMatch>> {
        let catalog = self.catalog()?;
        rank_matches(
            keywords,
            catalog
                .iter()
                .map(|(symbol, intervals)| (symbol.as_str(), None, intervals.clone())),
        )
    }
}

/// Read a price CSV file into a validated series.
pub fn read_price_csv(path: &Path) -> Result<PriceSeries> {
    let reader = csv::Reader::from_path(path)?;
    parse_price_records(reader)
}

/// Parse price CSV text into a validated series.
pub fn parse_price_csv(content: &str) -> Result<PriceSeries> {
    parse_price_records(csv::Reader::from_reader(content.as_bytes()))
}

fn parse_price_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<PriceSeries> {
    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let record: PriceRecord = row?;
        let (date, time) = parse_timestamp(&record.timestamp)?;
        bars.push(PriceBar {
            date,
            time,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    PriceSeries::new(bars)
}

/// Accepts `YYYY-MM-DD`, optionally followed by `HH:MM[:SS]` after a space or `T`.
fn parse_timestamp(timestamp: &str) -> Result<(NaiveDate, Option<NaiveTime>)> {
    let unparseable =
        || Error::InvalidPriceData(format!("unparseable timestamp `{}`", timestamp));

    let trimmed = timestamp.trim();
    let (date_part, time_part) = match trimmed.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (trimmed, None),
    };

    let date = date_part.parse().map_err(|_| unparseable())?;
    let time = match time_part {
        Some(raw) => Some(
            NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
                .map_err(|_| unparseable())?,
        ),
        None => None,
    };
    Ok((date, time))
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
