//! AMD driver version table.
//!
//! AMD drivers report internal Vulkan and OpenGL version numbers that do not
//! match the marketing versions users know ("24.2.1"). GPUOpen publishes a
//! mapping as XML:
//!
//! ```xml
//! <drivers>
//!   <driver version="24.2.1">
//!     <windows-version>31.0.24002.92</windows-version>
//!     <vulkan-version>2.0.294</vulkan-version>
//!     <internal-version>24.10.2</internal-version>
//!   </driver>
//! </drivers>
//! ```
//!
//! [`AmdDriverTable`] is an immutable snapshot of that mapping. Lookups never
//! block or fetch; a lookup that would benefit from newer data says so through
//! [`Lookup::missed`], and the pipeline asks [`AmdTableProvider`] for a single
//! refresh before normalizing again.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::AmdConfig;
use crate::version::Version;

#[derive(Debug)]
pub enum AmdTableError {
    Http(reqwest::Error),
    Status(u16),
    Parse(String),
}

impl std::fmt::Display for AmdTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmdTableError::Http(e) => write!(f, "AMD table fetch failed: {}", e),
            AmdTableError::Status(code) => write!(f, "AMD table fetch returned HTTP {}", code),
            AmdTableError::Parse(msg) => write!(f, "AMD table is malformed: {}", msg),
        }
    }
}

impl std::error::Error for AmdTableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmdTableError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AmdTableError {
    fn from(e: reqwest::Error) -> Self {
        AmdTableError::Http(e)
    }
}

/// Result of one table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub text: String,
    /// The table had no answer that fresher data might provide.
    pub missed: bool,
}

impl Lookup {
    fn hit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            missed: false,
        }
    }

    fn miss(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            missed: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmdDriverTable {
    /// Vulkan version to driver versions, newest first.
    vulkan: BTreeMap<String, Vec<String>>,
    /// Windows (OpenGL) driver version to driver version.
    opengl: BTreeMap<String, String>,
    internal: BTreeMap<String, String>,
}

#[derive(Default)]
struct DriverEntry {
    version: String,
    windows: Option<String>,
    vulkan: Option<String>,
    internal: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Windows,
    Vulkan,
    Internal,
}

impl AmdDriverTable {
    pub fn is_empty(&self) -> bool {
        self.vulkan.is_empty() && self.opengl.is_empty()
    }

    pub fn parse_xml(xml: &[u8]) -> Result<Self, AmdTableError> {
        let mut table = AmdDriverTable::default();
        let mut reader = quick_xml::Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut entry: Option<DriverEntry> = None;
        let mut field: Option<Field> = None;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                    b"driver" => {
                        let version = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"version")
                            .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
                            .unwrap_or_default();
                        entry = Some(DriverEntry {
                            version,
                            ..DriverEntry::default()
                        });
                    }
                    b"windows-version" => field = Some(Field::Windows),
                    b"vulkan-version" => field = Some(Field::Vulkan),
                    b"internal-version" => field = Some(Field::Internal),
                    _ => {}
                },
                Ok(quick_xml::events::Event::Text(te)) => {
                    if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                        let value = te
                            .unescape()
                            .map_err(|e| AmdTableError::Parse(e.to_string()))?
                            .trim()
                            .to_string();
                        match f {
                            Field::Windows => current.windows = Some(value),
                            Field::Vulkan => current.vulkan = Some(value),
                            Field::Internal => current.internal = Some(value),
                        }
                    }
                }
                Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                    b"driver" => {
                        if let Some(done) = entry.take() {
                            table.insert(done);
                        }
                    }
                    b"windows-version" | b"vulkan-version" | b"internal-version" => field = None,
                    _ => {}
                },
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(AmdTableError::Parse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }
        for versions in table.vulkan.values_mut() {
            let mut seen = std::collections::HashSet::new();
            versions.retain(|v| seen.insert(v.clone()));
        }
        Ok(table)
    }

    fn insert(&mut self, entry: DriverEntry) {
        let Some(vulkan) = entry.vulkan else {
            return;
        };
        let versions = self.vulkan.entry(vulkan).or_default();
        if entry.version.is_empty() {
            return;
        }
        versions.insert(0, entry.version.clone());
        if let Some(windows) = entry.windows.filter(|w| !w.is_empty()) {
            self.opengl.insert(windows, entry.version.clone());
        }
        if let Some(internal) = entry.internal.filter(|i| !i.is_empty()) {
            self.internal.insert(internal, entry.version);
        }
    }

    /// Marketing version for an internal driver build number.
    pub fn from_internal(&self, internal_version: &str) -> Option<&str> {
        self.internal.get(internal_version).map(String::as_str)
    }

    /// Maps a Windows OpenGL driver version to a marketing version.
    pub fn from_opengl(&self, opengl_version: &str) -> Lookup {
        if let Some(driver) = self.opengl.get(opengl_version) {
            return Lookup::hit(driver.clone());
        }
        let Some(gl) = Version::parse(opengl_version) else {
            return Lookup::hit(opengl_version);
        };
        // Newer drivers print the marketing version directly with a date-like revision.
        if gl.major >= 22 && gl.minor < 13 && gl.build_or_zero() < 10 && gl.revision_or_zero() > 220600 {
            return Lookup::hit(format!("{}.{}.{}", gl.major, gl.minor, gl.build_or_zero()));
        }

        let mut known: Vec<(Version, &String)> = self
            .opengl
            .iter()
            .filter_map(|(k, v)| Version::parse(k).map(|ver| (ver, v)))
            .collect();
        if known.is_empty() {
            return Lookup::miss(opengl_version);
        }
        known.sort_by(|a, b| a.0.cmp(&b.0));

        let (oldest_ver, oldest_driver) = known[0];
        if gl < oldest_ver {
            return Lookup::hit(format!("older than {} ({})", oldest_driver, opengl_version));
        }
        let (newest_ver, newest_driver) = known[known.len() - 1];
        if gl > newest_ver {
            return Lookup::miss(format!("newer than {} ({})", newest_driver, opengl_version));
        }

        if let Some((_, driver)) = known
            .iter()
            .find(|(v, _)| v.minor == gl.minor && v.build == gl.build)
        {
            return Lookup::hit(format!("{} rev {}", driver, gl.revision_or_zero()));
        }
        for pair in known.windows(2) {
            if gl > pair[0].0 && gl < pair[1].0 {
                return Lookup::hit(format!("probably {}", pair[0].1));
            }
        }
        Lookup::hit(opengl_version)
    }

    /// Maps an AMD Vulkan driver version to marketing versions.
    pub fn from_vulkan(&self, vulkan_version: &str) -> Lookup {
        let exact = self.vulkan.get(vulkan_version);
        let missed = exact.is_none();
        if let Some(drivers) = exact.filter(|d| !d.is_empty()) {
            return Lookup::hit(match drivers.as_slice() {
                [only] => only.clone(),
                [first, .., last] => format!("{} - {}", first, last),
                [] => vulkan_version.to_string(),
            });
        }
        let answer = |text: String| Lookup { text, missed };

        let Some(vk) = Version::parse(vulkan_version) else {
            return answer(vulkan_version.to_string());
        };
        let mut known: Vec<(Version, &Vec<String>)> = self
            .vulkan
            .iter()
            .filter_map(|(k, v)| Version::parse(k).map(|ver| (ver, v)))
            .collect();
        if known.is_empty() {
            return answer(vulkan_version.to_string());
        }
        known.sort_by(|a, b| a.0.cmp(&b.0));

        let (oldest_ver, oldest_drivers) = known[0];
        if vk < oldest_ver {
            if let Some(first) = oldest_drivers.first() {
                return answer(format!("older than {} ({})", first, vulkan_version));
            }
        }
        let (newest_ver, newest_drivers) = known[known.len() - 1];
        if vk > newest_ver {
            if let Some(last) = newest_drivers.last() {
                return Lookup::miss(format!("newer than {} ({})", last, vulkan_version));
            }
        }
        for i in 1..known.len() {
            if vk >= known[i].0 {
                continue;
            }
            if let (Some(lower), Some(upper)) = (known[i - 1].1.first(), known[i].1.last()) {
                return answer(format!(
                    "unknown version between {} and {} ({})",
                    lower, upper, vulkan_version
                ));
            }
        }
        answer(vulkan_version.to_string())
    }
}

/// Where fresh table XML comes from.
#[async_trait]
pub trait AmdTableSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, AmdTableError>;
}

/// Fetches the table over HTTPS.
pub struct HttpTableSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTableSource {
    pub fn new(config: &AmdConfig) -> Result<Self, AmdTableError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.table_url.clone(),
        })
    }
}

#[async_trait]
impl AmdTableSource for HttpTableSource {
    async fn fetch(&self) -> Result<Vec<u8>, AmdTableError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AmdTableError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another caller is refreshing, or the table is still fresh.
    Skipped,
    Failed,
}

/// Holds the current table snapshot and refreshes it on demand.
pub struct AmdTableProvider {
    source: Box<dyn AmdTableSource>,
    refresh_interval: Duration,
    table: RwLock<Arc<AmdDriverTable>>,
    /// Held while a refresh runs; records when the last one finished.
    last_refresh: tokio::sync::Mutex<Option<Instant>>,
}

impl AmdTableProvider {
    pub fn new(source: Box<dyn AmdTableSource>, refresh_interval: Duration) -> Self {
        Self::with_table(source, refresh_interval, AmdDriverTable::default())
    }

    pub fn with_table(
        source: Box<dyn AmdTableSource>,
        refresh_interval: Duration,
        table: AmdDriverTable,
    ) -> Self {
        Self {
            source,
            refresh_interval,
            table: RwLock::new(Arc::new(table)),
            last_refresh: tokio::sync::Mutex::new(None),
        }
    }

    pub fn from_config(config: &AmdConfig) -> Result<Self, AmdTableError> {
        Ok(Self::new(
            Box::new(HttpTableSource::new(config)?),
            Duration::from_secs(config.refresh_interval_secs),
        ))
    }

    pub fn snapshot(&self) -> Arc<AmdDriverTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Fetches a new table unless one is already being fetched or the
    /// current one is younger than the refresh interval.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(mut last) = self.last_refresh.try_lock() else {
            tracing::debug!("AMD table refresh already in flight");
            return RefreshOutcome::Skipped;
        };
        if last.is_some_and(|at| at.elapsed() < self.refresh_interval) {
            return RefreshOutcome::Skipped;
        }
        let result = match self.source.fetch().await {
            Ok(xml) => AmdDriverTable::parse_xml(&xml),
            Err(e) => Err(e),
        };
        *last = Some(Instant::now());
        match result {
            Ok(table) => {
                tracing::info!(
                    vulkan = table.vulkan.len(),
                    opengl = table.opengl.len(),
                    "AMD driver table refreshed"
                );
                let fresh = Arc::new(table);
                match self.table.write() {
                    Ok(mut guard) => *guard = fresh,
                    Err(poisoned) => *poisoned.into_inner() = fresh,
                }
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to update AMD version mapping");
                RefreshOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<drivers>
  <driver version="23.12.1">
    <windows-version>31.0.22023.1014</windows-version>
    <vulkan-version>2.0.283</vulkan-version>
    <internal-version>23.40.2</internal-version>
  </driver>
  <driver version="24.1.1">
    <windows-version>31.0.24001.1004</windows-version>
    <vulkan-version>2.0.283</vulkan-version>
  </driver>
  <driver version="24.2.1">
    <windows-version>31.0.24002.92</windows-version>
    <vulkan-version>2.0.294</vulkan-version>
  </driver>
  <driver version="">
    <vulkan-version>2.0.100</vulkan-version>
  </driver>
  <driver version="99.0.0">
    <windows-version>31.0.1.1</windows-version>
  </driver>
</drivers>"#;

    fn table() -> AmdDriverTable {
        AmdDriverTable::parse_xml(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn parses_entries_and_skips_missing_vulkan() {
        let t = table();
        assert_eq!(t.vulkan["2.0.283"], vec!["24.1.1", "23.12.1"]);
        assert!(t.vulkan["2.0.100"].is_empty());
        assert!(!t.opengl.contains_key("31.0.1.1"));
        assert_eq!(t.from_internal("23.40.2"), Some("23.12.1"));
    }

    #[test]
    fn vulkan_lookups() {
        let t = table();
        assert_eq!(t.from_vulkan("2.0.294"), Lookup::hit("24.2.1"));
        assert_eq!(t.from_vulkan("2.0.283").text, "24.1.1 - 23.12.1");
        let newer = t.from_vulkan("2.0.300");
        assert!(newer.missed);
        assert_eq!(newer.text, "newer than 24.2.1 (2.0.300)");
        let between = t.from_vulkan("2.0.290");
        assert!(between.missed);
        assert_eq!(between.text, "unknown version between 24.1.1 and 24.2.1 (2.0.290)");
    }

    #[test]
    fn opengl_lookups() {
        let t = table();
        assert_eq!(t.from_opengl("31.0.24002.92"), Lookup::hit("24.2.1"));
        assert_eq!(t.from_opengl("31.0.24001.900").text, "24.1.1 rev 900");
        assert_eq!(t.from_opengl("31.0.22500.1").text, "probably 23.12.1");
        assert_eq!(t.from_opengl("30.0.1.1").text, "older than 23.12.1 (30.0.1.1)");
        assert!(t.from_opengl("32.0.1.1").missed);
        assert_eq!(t.from_opengl("23.5.2.230512").text, "23.5.2");
        assert_eq!(t.from_opengl("not a version").text, "not a version");
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AmdTableSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<u8>, AmdTableError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SAMPLE.as_bytes().to_vec())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl AmdTableSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<u8>, AmdTableError> {
            Err(AmdTableError::Status(503))
        }
    }

    #[tokio::test]
    async fn refresh_swaps_snapshot_once_per_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = AmdTableProvider::new(
            Box::new(CountingSource {
                calls: Arc::clone(&calls),
            }),
            Duration::from_secs(3600),
        );
        assert!(provider.snapshot().is_empty());
        assert_eq!(provider.refresh().await, RefreshOutcome::Refreshed);
        assert_eq!(provider.snapshot().from_vulkan("2.0.294").text, "24.2.1");
        assert_eq!(provider.refresh().await, RefreshOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_table() {
        let provider =
            AmdTableProvider::with_table(Box::new(FailingSource), Duration::ZERO, table());
        assert_eq!(provider.refresh().await, RefreshOutcome::Failed);
        assert_eq!(provider.snapshot().from_vulkan("2.0.294").text, "24.2.1");
    }
}
