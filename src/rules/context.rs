//! Inputs the rules read besides the model itself.
//!
//! Static tables ([`KnownIds`]) and the per-upload [`Enrichment`] snapshot are
//! passed in explicitly. The snapshot is gathered up front by
//! [`EnrichmentSources::gather`] from optional collaborators; a collaborator
//! that is missing or fails leaves its field `None`.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::titles::{builtin_groups, TitleGroup};
use crate::config::FreshnessConfig;
use crate::normalize::NormalizedModel;

// ═══════════════════════════════════════════════════════════════════════
// Collaborator traits
// ═══════════════════════════════════════════════════════════════════════

/// File listing of a title's reference dump (an IRD manifest or similar).
#[async_trait]
pub trait TitleManifestSource: Send + Sync {
    /// Every file name in the dump, relative to the disc root. An empty list
    /// means no manifest is known for `serial`.
    async fn file_names(&self, serial: &str) -> Result<Vec<String>>;
}

/// Latest official build metadata.
#[async_trait]
pub trait ReleaseInfoSource: Send + Sync {
    async fn latest(&self, current_commit: Option<&str>) -> Result<Option<ReleaseInfo>>;
}

/// Compatibility database entry for a title.
#[async_trait]
pub trait TitleInfoSource: Send + Sync {
    async fn lookup(&self, serial: &str) -> Result<Option<TitleInfo>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Download link of the newest build, e.g. `.../rpcs3-v0.0.32-16500-abcdef12_win64.7z`.
    pub latest_download: String,
    pub latest_build_time: Option<DateTime<Utc>>,
    /// Build time of the commit the log was produced by, when the source knows it.
    pub current_build_time: Option<DateTime<Utc>>,
}

impl ReleaseInfo {
    /// How far the logged build lags behind the newest one.
    pub fn update_delta(&self) -> Option<Duration> {
        match (self.latest_build_time, self.current_build_time) {
            (Some(latest), Some(current)) => Some(latest - current),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatStatus {
    Nothing,
    Loadable,
    Intro,
    Ingame,
    Playable,
}

impl CompatStatus {
    pub fn is_not_working(self) -> bool {
        matches!(
            self,
            CompatStatus::Nothing | CompatStatus::Loadable | CompatStatus::Intro
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    pub status: Option<CompatStatus>,
    /// Newest game update version, e.g. `1.05`.
    pub update_version: Option<String>,
    /// PARAM.SFO resolution codes such as `720`, `1080`, `480SQ`.
    #[serde(default)]
    pub supported_resolutions: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════════════════

/// Everything the collaborators answered for one upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub manifest: Option<Vec<String>>,
    pub release: Option<ReleaseInfo>,
    pub title: Option<TitleInfo>,
}

/// Optional collaborators; any of them may be absent.
#[derive(Default)]
pub struct EnrichmentSources {
    pub manifest: Option<Box<dyn TitleManifestSource>>,
    pub release: Option<Box<dyn ReleaseInfoSource>>,
    pub title: Option<Box<dyn TitleInfoSource>>,
}

impl EnrichmentSources {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_none() && self.release.is_none() && self.title.is_none()
    }

    /// Queries every configured collaborator concurrently.
    pub async fn gather(&self, model: &NormalizedModel) -> Enrichment {
        let serial = model.get_non_empty("serial");
        let commit = model.get_non_empty("build_commit");

        let manifest = async {
            let (Some(source), Some(serial)) = (self.manifest.as_ref(), serial) else {
                return None;
            };
            match source.file_names(serial).await {
                Ok(names) if names.is_empty() => None,
                Ok(names) => Some(names),
                Err(e) => {
                    tracing::warn!(error = %e, serial, "title manifest lookup failed");
                    None
                }
            }
        };
        let release = async {
            let source = self.release.as_ref()?;
            match source.latest(commit).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "release info lookup failed");
                    None
                }
            }
        };
        let title = async {
            let (Some(source), Some(serial)) = (self.title.as_ref(), serial) else {
                return None;
            };
            match source.lookup(serial).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, serial, "title info lookup failed");
                    None
                }
            }
        };

        let (manifest, release, title) = tokio::join!(manifest, release, title);
        Enrichment {
            manifest,
            release,
            title,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Known title IDs
// ═══════════════════════════════════════════════════════════════════════

fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn set_lower(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_lowercase()).collect()
}

/// Serial sets and hash sets that gate individual rules.
#[derive(Debug, Clone)]
pub struct KnownIds {
    pub supports_1080p: HashSet<String>,
    pub disable_vertex_cache: HashSet<String>,
    pub no_approximate_xfloat: HashSet<String>,
    pub no_relaxed_xfloat: HashSet<String>,
    pub fps_unlock_patch: HashSet<String>,
    pub write_color_buffers: HashSet<String>,
    pub res_scale_threshold: HashSet<String>,
    pub motion_controls: HashSet<String>,
    pub require_interpreter: HashSet<String>,
    pub require_accurate_xfloat: HashSet<String>,
    pub relaxed_zcull: HashSet<String>,
    /// Lowercase license file names.
    pub bogus_licenses: HashSet<String>,
    /// Lowercase license file names.
    pub custom_licenses: HashSet<String>,
    /// Lowercase SPU hashes of known MLAA patches.
    pub mlaa_spu_hashes: HashSet<String>,
    /// Lowercase folder names of file sync services.
    pub sync_folders: HashSet<String>,
    pub titles: Vec<TitleGroup>,
}

impl KnownIds {
    pub fn builtin() -> Self {
        Self {
            supports_1080p: set(&["NPEB00258", "NPUB30162", "NPJB00068"]),
            disable_vertex_cache: set(&[
                "BLES01219", "BLUS30616", // penguins
                "NPEB00754", "NPUB30605", // real steel
                "BLES01379", "BLUS30813",
                "BLES00895", "BLUS30525", "BLAS50277",
                "BLES01446", "BLUS30565", "BLJM60391", // sh downpour
                "BLES02070", "BLUS31460", "BLJM61220", // kh 2.5
                "NPEB00258", "NPUB30162", "NPJB00068", // scott pilgrim
                "NPEB00303", "NPUB30242", "NPHB00229", // crazy taxi
                "NPEB00630", "NPUB30493", "NPJB00161", "NPHB00383",
                "BLES00712", "BLUS30398", "BLJS10039", "BLJS50009",
                "NPEB00304", "NPUB30249", "NPJB00083", "NPHB00228",
                "BLES00024", "BLUS30032", "NPEB00788", "NPUB30636", "NPHB00481",
                "BLES01342", "BLUS30666", "BLES01343", "BLKS20333", "BLES01747",
                "BLES01748", "BLUS31062", "NPEB00890", "NPUB30700", // saints row 3
            ]),
            no_approximate_xfloat: set(&[
                "BLES02247", "BLUS31604", "BLJM61346", "NPEB02436", "NPUB31848", "NPJB00769",
                "BLES00932", "BLUS30443",
            ]),
            no_relaxed_xfloat: HashSet::new(),
            fps_unlock_patch: set(&[
                "BLES00932", "BLUS30443", // des
                "BLUS30481", "BLES00826", "BLJM60223", // nier
                "BLUS31197", "NPUB31251", "NPEB01407", "BLJM61043", "BCAS20311", // dod3
                "BLUS31405", "BLJS10318", // jojo
                "BLES00148", "BLES00149", "BLES00154", "BLES00155", "BLES00156",
                "BLUS30072", "BLJS10013", "BLKS20048", "NPEB00740", "NPUB30588", // cod4
                "BLES01329", "BLES01330", "BLUS30778", "BLJM60413", "BLAS50546",
                "BLES01885", "BLES01886", "BLUS31202", "BLJM61086", "BLAS50624", // skyrim
                "BLJM61211", "BLJM55085", "BLAS50763", "NPEB02076", "NPUB31552", "NPJB00653",
                "BLJM61272", "NPEB02226", "NPUB31689", "NPJB00726",
                "BLES01773", "BLUS31051", "NPEB90478",
                "BLES00875", "BLUS30490", "BLJM60180", "BLUD80019",
                "BLES01265", "NPEB00625",
                "NPEB01088", "NPEB01224", "NPEB00316", "BLES00704",
                "BLES01227", "BLUS30721", "BLJM60409", // asura's wrath
                "BLES00827", "BLUS30515", "NPEB01156", "NPEB90170",
            ]),
            write_color_buffers: set(&[
                "BLUS30235", "BLES00453",
                "BLUS30399", "BCJS30021", "BCAS20050",
                "BLUS30607", "BLES0126", "NPUB30545", "BLJM60359",
                "BLUS30027", "BLES00039", "BLJM60012", "NPEB90009", "NPUB90008", // armored core 4
                "BLES00370", "BLUS30187", "BLJM60066", "NPHB00033", "NPJB90067",
                "BLES01882", "BLES01883", "BLES01884", "BLUS31193", "NPEB01396",
                "NPUB31246", "BLJM61056", "BLUS31483", "BLES02085", // ac4
                "BLES01275", "BLUS30762", "NPEB00723", "NPJB00202", "NPUB30742",
                "BLAS50380", "BLJM60384", "NPHB00491", "NPUB90600", "BLET70016", // bf3
                "BLUS30782", "BLES01402", "BLES01396", "BLJM60993", "BLAS50397",
                "BLES01765", "BLJM60517", // dark souls
                "BLES00932", "BLUS30443", "BCJS70013", "BCJS30022", // des
                "BCAS25003", "BCES00510", "BCES00516", "BCES00799", "BCJS37001",
                "BCUS98111", "BCKS15003", "NPUA70080", // gow3
                "BCES01741", "BCES01742", "BCUS98232", "NPEA00445", "NPUA80918",
                "NPHA80258", "BCJS37008", "BCAS25016", "NPJA00094", "BCKS15012",
                "NPEA90123", "NPUA70265", "NPUA70269", "NPEA90115", "NPUA70216", "BCET70050", // gow ascension
                "BLES00229", "BLUS30127", "BLJM60093", "BLES01128", "BLUS30682", // gta4
                "BLES01807", "BLUS31156", "NPEB01283", "NPUB31154", "BLJM61019",
                "BLJM61182", "BLJM61304", "NPJB00516", // gta5
                "BCES00797", "BCES00802", "BCUS98164", "BCAS20107", "BCES00458",
                "BCES01293", "BCJS30040", // heavy rain
                "BCES01007", "BCUS98234", "BCAS25008", "BCJS30066", "NPUA70167",
                "NPEA00321", "NPJA00071", // killzone 3
                "BCES00141", "BCUS98148", "NPEA00241", "NPUA80472", "BCAS20058",
                "BCJS30018", "BCUS98199", "BCJS70009", "BCKS10059", "BCES00611",
                "BCUS98208", "BCAS20078", // lbp
                "BLES00246", "BLUS30109", "BLJM67001", "NPEB02182", "NPUB31633",
                "BLAS55002", "BLAS55004", "BLKS25002", "NPJB00698", // mgs4
                "BLUS30481", "BLES00826", "BLJM60223", // nier
                "BLES00680", "BLUS30418", "NPEB00833", "NPUB30638", "BLJM60265",
                "BLKS20202", "NPHB00465", "BLES01294", "BLUS30758", "BLJM60403",
                "BLAS50382", "BLKS20315", "NPJB00504", // rdr
                "BLES01329", "BLES01330", "BLUS30778", "BLJM60413", "BLAS50546",
                "BLES01885", "BLES01886", "BLUS31202", "BLJM61086", "BLAS50624", // skyrim
                "BCES00065", "BCUS98103", "BCJS30015", "BCAS20024", "NPEA00363", // uncharted
                "BCES00509", "BCES00727", "BCES00757", "BCUS98123", "BCJS30035", // uncharted 2
                "BCES01175", "BCES01176", "BCUS98233", "BCJS37004", "BCAS25009", // uncharted 3
                "BLES00694", "BLUS30378",
            ]),
            res_scale_threshold: set(&[
                "BCAS20270", "BCES01584", "BCES01585", "BCJS37010", "BCUS98174",
                "NPEA00435", "NPEA90122", "NPHA80243", "NPHA80279", "NPJA00096",
                "NPJA00129", "NPUA70257", "NPUA80960", "NPUA81175",
            ]),
            motion_controls: set(&[
                "BCES00797", "BCES00802", "BCUS98164", "BCJS30040", "NPEA90053",
                "NPEA90076", "NPUA70088", "NPUA70112", // heavy rain
                "BCAS25017", "BCES01121", "BCES01122", "BCES01123", "BCUS98298",
                "NPEA00513", "NPUA81087", "NPEA90127", "NPJA90259", "NPUA72074", "NPJA00097",
                "NPEA00094", "NPEA00250", "NPJA00039", "NPUA80083", // flower
                "NPEA00036", "NPUA80069", "NPJA00004", // locoroco
                "BCES01284", "BCUS98247", "BCUS99142", "NPEA00429", "NPUA80875",
                "NPEA90120", "NPUA70250", // sly 4
                "BCAS20112", "BCAS20189", "BCKS10112", "BLES01101", "BLJS10072",
                "BLJS10114", "BLJS50026", "BLUS30652", "NPEB90321",
                "BCUS98116", "BCES00081", "BCAS20066", "BCJS30032", // killzone 2
            ]),
            require_interpreter: set(&[
                "NPEB02126", "NPUB31590",
                "BLES00023", "BLUS30006", "BLJS10007",
                "NPEB00220", "NPUB30254", "NPHB00297",
                "BLES00189", "BLES00190", "BLUS30105",
                "BLES02185", "NPEB02302", "NPUB31776",
                "NPEB01386", "NPJB00562", "NPUB31244", "NPUB31569",
                "BCUS98144", "BCES00112", "NPEA90021", "NPUA80112",
                "BLUS31152", "BLES01793", "BLJM60486", "NPUB31115", "NPEB01262",
                "BLES00103", "BLUS30052", "BLJM60072", "NPEB90043", "NPUB90063",
                "BLES01796", "BLUS31381", "BLJM61068", "NPEB01332", "NPUB31231", "NPJB00415",
                "BLUS31465", "BLES02061", "BLES02062", "BLJM61208", "NPEB02064", "NPUB31547",
                "BLES01667", "BLES01668", "BLES01669", "BLES01968", "BLUS30991",
                "BLJM61174", "BLJM60516", "NPEB01099", "NPUB30826",
                "BLES00909", "BLES00910", "BLES00911", "BLUS30537", "BLJM60250",
                "BLKS20231", "NPEB00600", "NPUB30522", "BLET70013", "NPUB90483",
            ]),
            require_accurate_xfloat: set(&[
                "BLES00229", "BLES00258", "BLES00887", "BLES01128",
                "BLJM55011", "BLJM60235", "BLJM60459", "BLJM60525", "BLJM61180",
                "BLKS20073", "BLKS20198",
                "BLUS30127", "BLUS30149", "BLUS30524", "BLUS30682",
                "NPEB00882", "NPUB30702", "NPUB30704", "NPEB00511",
                "BLES01867", "BLUS31184", "BLJS10218", "NPEB01369", "NPUB31219",
                "BLES01999", "NPEB01955", "NPUB50339", // metro ll
            ]),
            relaxed_zcull: set(&[
                "BLAS50296", "BLES00680", "BLES01179", "BLES01294", "BLUS30418",
                "BLUS30711", "BLUS30758", "BLJM60314", "BLJM60403", "BLJM61181",
                "BLKS20315", "NPEB00833", "NPHB00465", "NPHB00466", "NPUB30638",
                "NPUB30639", "NPUB50139", // rdr
                "BLAS55005", "BLES00246", "BLJM57001", "BLJM67001", "BLKS25001",
                "BLUS30109", "BLUS30148", "NPEB00027", "NPEB02182", "NPEB90116",
                "NPJB00698", "NPJB90149", "NPUB31633", "NPHB00065", "NPHB00067", // mgs4
                "BCAS20100", "BCES00664", "NPEA00057", "NPJA00031", "NPUA80105",
                "BCES01584", "BCES01585", "BCUS98174", "BCJS37010", "BCAS20270",
                "NPEA00435", "NPUA80960", "NPJA00096", "NPHA80243", "NPEA00521",
                "NPUA81175", "NPJA00129", "NPHA80279", "NPEA90122", "NPUA70257", "NPHA80246", // tlou
                "BCES01175", "BCES01176", "BCUS98233", "BCJS37004", "BCAS25009",
                "BLJM61249", "BLAS50796", "NPJB00684", "NPHB00720", // yakuza 0
                "BLES00148", "BLES00149", "BLES00154", "BLES00155", "BLES00156",
                "BLUS30072", "BLJS10013", "BLKS20048", "NPEB00740", "NPUB30588", // cod4
                "BCES01007", "BCUS98234", "BCAS25008", "BCJS30066", "NPUA70167",
                "NPEA00321", "NPJA00071", // killzone 3
                "BCES00484", "BCUS98242", "NPEA00315", "NPUA80661",
            ]),
            bogus_licenses: set_lower(&[
                "UP0700-NPUB30932_00-NNKDLFULLGAMEPTB.rap",
                "EP0700-NPEB01158_00-NNKDLFULLGAMEPTB.rap",
            ]),
            custom_licenses: set_lower(&[
                "EP4062-NPEB02436_00-PPERSONA5X000000.rap",
                "UP2611-NPUB31848_00-PPERSONA5X000000.rap",
            ]),
            mlaa_spu_hashes: set_lower(&[
                "1549476fe258150ff9f902229ffaed69a932a9c1",
                "191fe1c92c8360992b3240348e70ea37d50812d4",
                "2239af4827b17317522bd6323c646b45b34ebf14",
                "45f98378f0837fc6821f63576f65d47d10f9bbcb",
                "5177cbc4bf45c8a0a6968c2a722da3a9e6cfb28b",
                "530c255936b07b25467a58e24ceff5fd4e2960b7",
                "702d0205a89d445d15dc0f96548546c4e2e7a59f",
                "794795c449beef176d076816284849d266f55f99",
                "7b5ea49122ec7f023d4a72452dc7a9208d9d6dbf",
                "7cd211ff1cbd33163eb0711440dccbb3c1dbcf6c",
                "82b3399c8e6533ba991eedb0e139bf20c7783bac",
                "9001b44fd7278b5a6fa5385939fe928a0e549394",
                "931132fd48a40bce0bec28e21f760b1fc6ca4364",
                "969cf3e9db75f52a6b41074ccbff74106b709854",
                "976d2128f08c362731413b75c934101b76c3d73b",
                "a129a01a270246c85df18eee0e959ef4263b6510",
                "ac189d7f87091160a94e69803ac0cff0a8bb7813",
                "df5b1c3353cc36bb2f0fb59197d849bb99c3fecd",
                "e3780fe1dc8953f849ac844ec9688ff4da3ca3ae",
            ]),
            sync_folders: set_lower(&[
                "OneDrive",
                "MEGASync",
                "RslSync",
                "BTSync",
                "Google Drive",
                "Google Backup",
                "Dropbox",
            ]),
            titles: builtin_groups(),
        }
    }
}

impl Default for KnownIds {
    fn default() -> Self {
        Self::builtin()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rule context
// ═══════════════════════════════════════════════════════════════════════

/// Borrowed bundle handed to [`super::evaluate`].
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub known: &'a KnownIds,
    pub enrichment: &'a Enrichment,
    pub freshness: &'a FreshnessConfig,
    /// Bigram similarity above which fatal errors are merged.
    pub similarity_threshold: f64,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        known: &'a KnownIds,
        enrichment: &'a Enrichment,
        freshness: &'a FreshnessConfig,
    ) -> Self {
        Self {
            known,
            enrichment,
            freshness,
            similarity_threshold: 0.75,
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::model;
    use chrono::TimeZone;

    struct FixedManifest(Vec<String>);

    #[async_trait]
    impl TitleManifestSource for FixedManifest {
        async fn file_names(&self, _serial: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenRelease;

    #[async_trait]
    impl ReleaseInfoSource for BrokenRelease {
        async fn latest(&self, _commit: Option<&str>) -> Result<Option<ReleaseInfo>> {
            anyhow::bail!("connection refused")
        }
    }

    struct Playable;

    #[async_trait]
    impl TitleInfoSource for Playable {
        async fn lookup(&self, serial: &str) -> Result<Option<TitleInfo>> {
            Ok((serial == "BLUS30443").then(|| TitleInfo {
                status: Some(CompatStatus::Playable),
                ..TitleInfo::default()
            }))
        }
    }

    #[tokio::test]
    async fn failures_degrade_to_none() {
        let sources = EnrichmentSources {
            manifest: Some(Box::new(FixedManifest(vec!["PS3_GAME/USRDIR/EBOOT.BIN".into()]))),
            release: Some(Box::new(BrokenRelease)),
            title: Some(Box::new(Playable)),
        };
        let enrichment = sources.gather(&model(&[("serial", "BLUS30443")])).await;
        assert_eq!(enrichment.manifest.as_ref().map(Vec::len), Some(1));
        assert!(enrichment.release.is_none());
        assert_eq!(
            enrichment.title.and_then(|t| t.status),
            Some(CompatStatus::Playable)
        );
    }

    #[tokio::test]
    async fn no_serial_skips_title_lookups() {
        let sources = EnrichmentSources {
            manifest: Some(Box::new(FixedManifest(vec!["a".into()]))),
            title: Some(Box::new(Playable)),
            ..EnrichmentSources::none()
        };
        let enrichment = sources.gather(&model(&[])).await;
        assert_eq!(enrichment, Enrichment::default());
    }

    #[test]
    fn update_delta_needs_both_times() {
        let latest = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut info = ReleaseInfo {
            latest_download: String::new(),
            latest_build_time: Some(latest),
            current_build_time: None,
        };
        assert_eq!(info.update_delta(), None);
        info.current_build_time = Some(latest - Duration::days(40));
        assert_eq!(info.update_delta(), Some(Duration::days(40)));
    }

    #[test]
    fn builtin_tables_are_lowercased_where_compared_ignoring_case() {
        let known = KnownIds::builtin();
        assert!(known.sync_folders.contains("google drive"));
        assert!(known
            .custom_licenses
            .contains("ep4062-npeb02436_00-ppersona5x000000.rap"));
        assert!(known.relaxed_zcull.contains("BLUS30418"));
        assert!(!known.titles.is_empty());
    }
}
