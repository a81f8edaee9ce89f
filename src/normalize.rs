//! Normalization: a pure pass over the extraction model that decodes
//! vendor-specific values into the canonical forms the rules read.
//!
//! Every step derives its output from *source* keys only and reads boolean
//! values through [`is_on`]/[`is_off`], which accept both the raw
//! `true`/`false` and the canonical marks. That keeps the pass idempotent:
//! feeding a normalized model back in produces the same model.
//!
//! Steps, in order:
//!
//! | Step | Writes |
//! |------|--------|
//! | trailing `”` trim | every value |
//! | settings labels | `resolution_scale`, `spu_threads`, `thread_scheduler`, `af_override`, `zcull_status`, `lib_loader`, `frame_limit_combined`, `shader_mode`, `rsx_fifo_mode`, `cpu_preempt_count`, `xfloat_mode`, decoders |
//! | GPU identity + driver | `gpu_info`, `gpu_name`, `driver_version_info`, `discrete_gpu_info`, `gpu_available_info` |
//! | OS from paths | `os_type` |
//! | libraries, game version | `library_list*`, `game_version`, `game_update_version` |
//! | multi-value cleanup | `fatal_error`, `broken_filename`, `broken_directory` |
//! | disc-on-PSN rewrite | `serial`, `disc_to_psn_serial`, `game_category` |
//! | build line | `build_*`, `fw_version_installed`, `cpu_*`, `thread_count`, `memory_amount`, `os_*`, `log_from_ui` |
//! | WDDM fallback | `os_windows_version` when still unnamed |
//! | boolean marks | every `true`/`false` value |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::amd::AmdDriverTable;
use crate::drivers::{self, DriverVersion};
use crate::models::{ExtractionModel, UniqueList, DISABLED_MARK, ENABLED_MARK};
use crate::os_names;
use crate::sections::OS_INFO;
use crate::version::Version;

/// Disc serials re-released on PSN under a different serial.
const DISC_ON_PSN_IDS: &[(&str, &str)] = &[
    ("BLES00932", "NPEB01202"),
    ("BLUS30443", "NPUB30910"),
    ("BCJS30022", "NPJA00102"),
    ("BCJS30042", "NPJA00104"),
    ("BCJS30023", "NPJA00103"),
];

static BUILD_INFO: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?is)RPCS3 v(?<version_string>(?<version>(\d|\.)+)(-(?<build>\d+))?-(?<commit>[0-9a-z_]+|unknown))( (?<stage>\w+))?( \| (?<branch>[^|\r\n]+))?( \| Firmware version: (?<fw_version_installed>[^|\r\n]+))?( \| (?<unknown>.*))?\r?$",
    )
    .map_err(|e| tracing::error!(error = %e, "build line pattern failed to compile"))
    .ok()
});

static CPU_INFO: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2}(th|rd|nd|st) Gen)?(?<cpu_model>[^|@]+?)\s*(((CPU\s*)?@\s*(?<cpu_speed>.+)\s*GHz\s*)|((APU with|(with )?Radeon|R\d, \d+ Compute) [^|]+)|((\w+[\- ]Core )?Processor))?\s* \| (?<thread_count>\d+) Threads \| (?<memory_amount>[0-9\.\,]+) GiB RAM( \| TSC: (?<tsc>\S+))?( \| (?<cpu_extensions>.*?))?\r?$",
    )
    .map_err(|e| tracing::error!(error = %e, "cpu line pattern failed to compile"))
    .ok()
});

static OS_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(OS_INFO)
        .map_err(|e| tracing::error!(error = %e, "os line pattern failed to compile"))
        .ok()
});

static DECODER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?s)(?<name>[^(]+)(\((?<type>.+)\))?")
        .map_err(|e| tracing::error!(error = %e, "decoder pattern failed to compile"))
        .ok()
});

static VERSION_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?<version>\d+\.\d+(\.\d+){0,2})")
        .map_err(|e| tracing::error!(error = %e, "version prefix pattern failed to compile"))
        .ok()
});

/// `true` or `[x]`, case-insensitive for the raw form.
pub fn is_on(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v == ENABLED_MARK || v.eq_ignore_ascii_case("true"))
}

/// `false` or `[ ]`, case-insensitive for the raw form.
pub fn is_off(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v == DISABLED_MARK || v.eq_ignore_ascii_case("false"))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// The extraction model after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedModel {
    pub model: ExtractionModel,
    /// An AMD table lookup fell back to a bound or the raw value; a fresher
    /// table might have answered it.
    #[serde(skip)]
    pub amd_lookup_missed: bool,
}

impl NormalizedModel {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.model.get(key)
    }

    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.model.get_non_empty(key)
    }

    pub fn multi(&self, key: &str) -> &[String] {
        self.model.multi(key)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key) == Some(ENABLED_MARK)
    }

    pub fn is_disabled(&self, key: &str) -> bool {
        self.get(key) == Some(DISABLED_MARK)
    }

    /// Emulator version, only for official `master`/`HEAD` builds.
    pub fn rpcs3_version(&self) -> Option<Version> {
        match self.get("build_branch") {
            Some("HEAD") | Some("master") => self.get("build_full_version").and_then(Version::parse),
            _ => None,
        }
    }

    pub fn typed(&self) -> TypedView {
        TypedView::from_model(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Renderer {
    Vulkan,
    OpenGl,
    D3D12,
    Null,
    Other(String),
}

impl Renderer {
    fn parse(value: &str) -> Self {
        match value {
            "Vulkan" => Renderer::Vulkan,
            "OpenGL" => Renderer::OpenGl,
            "D3D12" => Renderer::D3D12,
            "Null" | "null" => Renderer::Null,
            other => Renderer::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GpuVendor {
    Amd,
    Nvidia,
    Intel,
    Apple,
    Other,
}

impl GpuVendor {
    pub fn detect(gpu: &str) -> Self {
        if drivers::is_nvidia(gpu) {
            GpuVendor::Nvidia
        } else if drivers::is_amd(gpu) {
            GpuVendor::Amd
        } else if drivers::is_intel(gpu) {
            GpuVendor::Intel
        } else if contains_ignore_case(gpu, "Apple") {
            GpuVendor::Apple
        } else {
            GpuVendor::Other
        }
    }
}

/// Typed projection of the well-known keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedView {
    pub renderer: Option<Renderer>,
    /// `(width, height)` from `resolution`.
    pub resolution: Option<(u32, u32)>,
    pub os_family: Option<OsFamily>,
    pub build_version: Option<Version>,
    pub thread_count: Option<u32>,
    pub memory_gib: Option<f64>,
    pub gpu_vendor: Option<GpuVendor>,
    pub serial: Option<String>,
}

impl TypedView {
    fn from_model(model: &NormalizedModel) -> Self {
        let resolution = model.get("resolution").and_then(|r| {
            let (w, h) = r.split_once('x')?;
            Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
        });
        let os_family = model.get_non_empty("os_type").map(|os| match os {
            "Windows" => OsFamily::Windows,
            "Linux" => OsFamily::Linux,
            "MacOS" => OsFamily::MacOs,
            other => OsFamily::Other(other.to_string()),
        });
        let gpu = model
            .get_non_empty("gpu_name")
            .or_else(|| model.get_non_empty("gpu_info"))
            .or_else(|| model.get_non_empty("discrete_gpu_info"));
        Self {
            renderer: model.get_non_empty("renderer").map(Renderer::parse),
            resolution,
            os_family,
            build_version: model.get("build_full_version").and_then(Version::parse),
            thread_count: model.get("thread_count").and_then(|t| t.parse().ok()),
            memory_gib: model
                .get("memory_amount")
                .and_then(|m| m.replace(',', ".").parse().ok()),
            gpu_vendor: gpu.map(GpuVendor::detect),
            serial: model.get_non_empty("serial").map(str::to_string),
        }
    }
}

/// Normalizes `raw` against an AMD table snapshot.
pub fn normalize(raw: &ExtractionModel, amd: &AmdDriverTable) -> NormalizedModel {
    let mut pass = Pass {
        model: raw.clone(),
        amd,
        missed: false,
    };
    pass.trim_closing_quotes();
    pass.settings_labels();
    pass.gpu_identity();
    pass.os_from_paths();
    pass.libraries();
    pass.game_versions();
    pass.multi_values();
    pass.disc_on_psn();
    pass.build_line();
    pass.windows_name_from_driver();
    pass.canonical_marks();
    NormalizedModel {
        model: pass.model,
        amd_lookup_missed: pass.missed,
    }
}

struct Pass<'t> {
    model: ExtractionModel,
    amd: &'t AmdDriverTable,
    missed: bool,
}

impl Pass<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.model.get(key)
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.model.get(key).map(str::to_string)
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.model.set(key, value);
    }

    fn trim_closing_quotes(&mut self) {
        for value in self.model.single.values_mut() {
            let trimmed = value.trim_end_matches('”');
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
        for list in self.model.multi.values_mut() {
            if list.as_slice().iter().any(|v| v.ends_with('”')) {
                *list = list
                    .as_slice()
                    .iter()
                    .map(|v| v.trim_end_matches('”').to_string())
                    .collect();
            }
        }
    }

    fn settings_labels(&mut self) {
        if is_on(self.get("strict_rendering_mode")) {
            self.set("resolution_scale", "Strict Mode");
        }
        if self.get("spu_threads") == Some("0") {
            self.set("spu_threads", "Auto");
        }
        let scheduler = self
            .get("thread_scheduler")
            .or_else(|| self.get("spu_secondary_cores"))
            .map(|s| {
                if is_off(Some(s)) || s == "Operating System" {
                    "OS".to_string()
                } else if is_on(Some(s)) || s == "RPCS3 Scheduler" {
                    "RPCS3".to_string()
                } else if s == "RPCS3 Alternative Scheduler" {
                    "RPCS3 Alt".to_string()
                } else {
                    s.to_string()
                }
            });
        if let Some(scheduler) = scheduler.filter(|s| !s.is_empty()) {
            self.set("thread_scheduler", scheduler);
        }

        match self.get("af_override") {
            Some("0") => self.set("af_override", "Auto"),
            Some("1") => self.set("af_override", "Disabled"),
            _ => {}
        }

        let zcull = if is_on(self.get("zcull")) {
            "Disabled"
        } else if is_on(self.get("relaxed_zcull")) {
            "Relaxed"
        } else {
            "Full"
        };
        self.set("zcull_status", zcull);

        if let Some(loader) = self.get("lib_loader").map(str::to_lowercase) {
            let liblv2 = loader.contains("liblv2");
            let auto = loader.contains("auto");
            let manual = loader.contains("manual");
            let strict = loader.contains("strict");
            let label = if auto && manual {
                "Auto & manual select"
            } else if liblv2 && manual {
                "Liblv2.sprx & manual"
            } else if liblv2 && strict {
                "Liblv2.sprx & strict"
            } else if auto {
                "Auto"
            } else if manual {
                "Manual selection"
            } else {
                "Liblv2.sprx only"
            };
            self.set("lib_loader", label);
        }

        if let Some(limit) = self.owned("frame_limit") {
            let vsync = is_on(self.get("vsync"));
            let combined = match (limit.as_str(), vsync) {
                ("Off", true) => "VSync".to_string(),
                ("Off", false) => "Off".to_string(),
                (_, true) => format!("{}+VSync", limit),
                (_, false) => limit.clone(),
            };
            self.set("frame_limit_combined", combined);
        }

        if let Some(mode) = self.owned("shader_mode") {
            let lower = mode.to_lowercase();
            let label = match (
                lower.contains("async"),
                lower.contains("recompiler"),
                lower.contains("interpreter"),
            ) {
                (true, true, false) => "Async",
                (true, _, true) => "Async+Interpreter",
                (false, true, false) => "Recompiler only",
                (false, _, true) => "Interpreter only",
                _ => mode.as_str(),
            }
            .to_string();
            self.set("shader_mode", label);
        } else if is_off(self.get("disable_async_shaders")) {
            self.set("shader_mode", "Async");
        } else if is_on(self.get("disable_async_shaders")) {
            self.set("shader_mode", "Recompiler only");
        }

        if let Some(fifo) = self.owned("rsx_fifo_mode") {
            let mut unquoted = fifo.as_str();
            while unquoted.len() >= 2 && unquoted.starts_with('"') && unquoted.ends_with('"') {
                unquoted = &unquoted[1..unquoted.len() - 1];
            }
            if unquoted.len() != fifo.len() {
                self.set("rsx_fifo_mode", unquoted.to_string());
            }
        }
        if self.get("cpu_preempt_count") == Some("0") {
            self.set("cpu_preempt_count", "Disabled");
        }

        if self.get("xfloat_mode").is_none() {
            let accurate = is_on(self.get("accurate_xfloat"));
            let approximate = is_on(self.get("approximate_xfloat"));
            let flag = |on: bool, c: char| if on { c } else { '-' };
            let mode = match self.get("relaxed_xfloat") {
                None => match (accurate, approximate) {
                    (true, _) => "Accurate".to_string(),
                    (_, true) => "Approximate".to_string(),
                    _ => format!("[{}{}]", flag(accurate, 'a'), flag(approximate, 'x')),
                },
                Some(relaxed_raw) => {
                    let relaxed = is_on(Some(relaxed_raw));
                    let known = |key: &str| is_on(self.get(key)) || is_off(self.get(key));
                    let all_known = known("accurate_xfloat") && known("approximate_xfloat") && known("relaxed_xfloat");
                    match (all_known, accurate, approximate, relaxed) {
                        (true, true, false, true) => "Accurate".to_string(),
                        (true, false, true, true) => "Approximate".to_string(),
                        (true, false, false, true) => "Relaxed".to_string(),
                        (true, false, false, false) => "Inaccurate".to_string(),
                        _ => format!(
                            "[{}{}{}]",
                            flag(accurate, 'a'),
                            flag(approximate, 'x'),
                            flag(relaxed, 'r')
                        ),
                    }
                }
            };
            self.set("xfloat_mode", mode);
        }

        for key in ["ppu_decoder", "spu_decoder"] {
            if let Some(label) = self.get(key).and_then(reformat_decoder) {
                self.set(key, label);
            }
        }
    }

    fn resolve(&mut self, version: DriverVersion) -> String {
        match version {
            DriverVersion::Plain(text) => text,
            DriverVersion::AmdVulkan(raw) => {
                let lookup = self.amd.from_vulkan(&raw);
                self.missed |= lookup.missed;
                lookup.text
            }
            DriverVersion::AmdOpenGl(raw) => {
                let lookup = self.amd.from_opengl(&raw);
                self.missed |= lookup.missed;
                lookup.text
            }
        }
    }

    fn gpu_identity(&mut self) {
        let found = self.model.multi("vulkan_found_device").to_vec();
        let gpu = self
            .get("vulkan_initialized_device")
            .or_else(|| self.get("driver_manuf_new"))
            .or_else(|| self.get("vulkan_gpu").filter(|g| *g != "\"\""))
            .or_else(|| self.get("d3d_gpu").filter(|g| *g != "\"\""))
            .or_else(|| self.get("driver_manuf"))
            .map(str::to_string);

        let mut gpu_info = None;
        let mut driver = None;
        if let Some(gpu) = gpu.filter(|g| !g.is_empty()) {
            let gpu = drivers::strip_marks(&gpu);
            let initialized = self.owned("vulkan_initialized_device").unwrap_or_default();
            let opengl = self
                .owned("driver_version_new")
                .or_else(|| self.owned("driver_version"))
                .unwrap_or_default();
            let raw = self.owned("vulkan_driver_version_raw").unwrap_or_default();
            let decoded = drivers::vulkan_device_version(&initialized, &found)
                .or_else(|| drivers::vulkan_device_version(&gpu, &found))
                .or_else(|| drivers::opengl_version(&gpu, &opengl))
                .or_else(|| drivers::decode_vulkan_raw(&gpu, &raw));
            driver = decoded.map(|d| self.resolve(d));
            gpu_info = Some(drivers::strip_opengl_maker(&gpu));
        }
        if let (Some(info), Some(driver)) = (gpu_info.as_mut(), driver.as_ref()) {
            self.set("gpu_name", info.clone());
            info.push_str(&format!(" ({})", driver));
        }
        if let Some(info) = gpu_info.as_ref() {
            self.set("gpu_info", info.clone());
        }
        if let Some(driver) = driver.as_ref() {
            self.set("driver_version_info", driver.clone());
        }

        let compatible = self.model.multi("vulkan_compatible_device_name").to_vec();
        if compatible.is_empty() {
            return;
        }
        let mut devices = Vec::with_capacity(compatible.len());
        for name in &compatible {
            let version = drivers::vulkan_device_version(name, &found).map(|d| self.resolve(d));
            devices.push((drivers::strip_marks(name), version.unwrap_or_default()));
        }
        devices.reverse();
        if gpu_info.as_deref().map_or(true, str::is_empty) {
            let discrete = devices
                .iter()
                .find(|(n, _)| drivers::is_nvidia(n))
                .or_else(|| devices.iter().find(|(n, _)| drivers::is_amd(n)))
                .or_else(|| devices.first());
            if let Some((name, version)) = discrete.cloned() {
                self.set("gpu_name", drivers::strip_opengl_maker(&name));
                self.set("discrete_gpu_info", format!("{} ({})", name, version));
                self.set("driver_version_info", version);
            }
        }
        let available = devices
            .iter()
            .map(|(n, v)| format!("{} ({})", n, v))
            .collect::<Vec<_>>()
            .join("\n");
        self.set("gpu_available_info", available);
    }

    fn os_from_paths(&mut self) {
        if self.get("win_path").is_some() {
            self.set("os_type", "Windows");
        } else if self.get("lin_path").is_some() {
            self.set("os_type", "Linux");
        }
    }

    /// Names Windows from the WDDM driver major when the OS line gave no name.
    /// Runs after [`Pass::build_line`] so `os_type` is final for this pass.
    fn windows_name_from_driver(&mut self) {
        if self.get("os_type") != Some("Windows") || self.get("os_windows_version").is_some() {
            return;
        }
        let driver = self
            .get("driver_version_new")
            .or_else(|| self.get("driver_version"))
            .and_then(os_names::wddm_windows_name);
        if let Some(name) = driver {
            self.set("os_windows_version", name);
        }
    }

    fn libraries(&mut self) {
        let Some(libs) = self.owned("library_list") else {
            self.set("library_list", "None");
            return;
        };
        let entries: Vec<(String, String)> = libs
            .split('\n')
            .map(|l| l.trim_matches(|c| matches!(c, ' ' | '\t' | '-' | '\r' | '[' | ']')))
            .filter(|l| !l.is_empty())
            .map(|l| {
                let mut parts = l.split(':');
                let name = parts.next().unwrap_or_default().to_string();
                let mode = parts.next().unwrap_or_default().to_string();
                (name, mode)
            })
            .collect();
        if libs.contains(".sprx:") {
            let mut lle = Vec::new();
            let mut hle = Vec::new();
            for (name, mode) in entries {
                match mode.as_str() {
                    "lle" => lle.push(name),
                    "hle" => hle.push(name),
                    other => tracing::warn!(mode = other, "unknown library override mode"),
                }
            }
            let join = |list: Vec<String>| {
                if list.is_empty() {
                    "None".to_string()
                } else {
                    list.join(", ")
                }
            };
            self.set("library_list", "None");
            self.set("library_list_lle", join(lle));
            self.set("library_list_hle", join(hle));
        } else if entries.is_empty() {
            self.set("library_list", "None");
        } else {
            let names: Vec<String> = entries.into_iter().map(|(n, _)| n).collect();
            self.set("library_list", names.join(", "));
        }
    }

    fn game_versions(&mut self) {
        let version = ["app_version", "disc_app_version", "disc_package_version"]
            .iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.eq_ignore_ascii_case("Unknown"))
            .map(strip_leading_zeros);
        if let Some(version) = version {
            self.set("game_version", version);
        }
        if let Some(update) = self.get("game_update_version").map(strip_leading_zeros) {
            self.set("game_update_version", update);
        }
    }

    fn multi_values(&mut self) {
        if let Some(errors) = self.model.multi.get_mut("fatal_error") {
            if errors.as_slice().iter().any(|e| e.contains("'tex00'")) {
                *errors = errors
                    .as_slice()
                    .iter()
                    .map(|e| {
                        if e.contains("'tex00'") {
                            e.split('\n').next().unwrap_or_default().to_string()
                        } else {
                            e.clone()
                        }
                    })
                    .collect::<UniqueList>();
            }
        }
        let either = self.model.multi("broken_filename_or_dir").to_vec();
        if !either.is_empty() {
            for key in ["broken_filename", "broken_directory"] {
                self.model
                    .multi
                    .entry(key.to_string())
                    .or_default()
                    .extend(either.iter().cloned());
            }
        }
    }

    fn disc_on_psn(&mut self) {
        let Some(serial) = self.owned("serial") else {
            return;
        };
        let Some((_, psn)) = DISC_ON_PSN_IDS
            .iter()
            .find(|(disc, _)| disc.eq_ignore_ascii_case(&serial))
        else {
            return;
        };
        let booted = self
            .get("ldr_game_serial")
            .or_else(|| self.get("ldr_path_serial"))
            .unwrap_or_default();
        let booted_from_psn = booted.len() >= 2 && booted[..2].eq_ignore_ascii_case("NP");
        if booted_from_psn && booted.eq_ignore_ascii_case(psn) {
            self.set("disc_to_psn_serial", serial);
            self.set("serial", *psn);
            self.set("game_category", "HG");
        }
    }

    fn build_line(&mut self) {
        let Some(mut info) = self.owned("build_and_specs") else {
            return;
        };
        let valid = info.starts_with("RPCS3") && info.matches('\n').count() < 3;
        if !valid {
            info = info.splitn(4, '\n').take(3).collect::<Vec<_>>().join("\n").trim().to_string();
            self.set("log_from_ui", ENABLED_MARK);
        }
        let parts: Vec<&str> = info.split(['\r', '\n']).filter(|p| !p.is_empty()).collect();
        let part = |idx: usize| parts.get(idx).copied().unwrap_or(info.as_str());

        let build = BUILD_INFO.as_ref().and_then(|re| re.captures(part(0)));
        if let Some(caps) = build.as_ref() {
            let group = |name: &str| caps.name(name).map_or("", |m| m.as_str()).trim().to_string();
            let version = group("version");
            let number = group("build");
            self.set("build_branch", group("branch"));
            self.set("build_commit", group("commit"));
            self.set("build_version_string", group("version_string"));
            self.set("build_stage", group("stage"));
            self.set("build_unknown", group("unknown"));
            self.set("build_version", version.clone());
            self.set("build_number", number.clone());
            if !number.is_empty() {
                self.set("build_full_version", format!("{}.{}", version, number));
            }
            let fw = group("fw_version_installed");
            if !fw.is_empty() {
                self.set("fw_version_installed", fw);
            }
        }
        if let Some(fw) = self.owned("fw_version_installed") {
            let mut split = fw.split('.');
            if let (Some(_), Some(minor), None) = (split.next(), split.next(), split.next()) {
                if fw.len() > 1 && minor.len() == 1 {
                    self.set("fw_version_installed", format!("{}0", fw));
                }
            }
        }

        if let Some(caps) = CPU_INFO.as_ref().and_then(|re| re.captures(part(1))) {
            let group = |name: &str| caps.name(name).map_or("", |m| m.as_str()).to_string();
            let model = drivers::strip_marks(&group("cpu_model")).replace(" CPU", "");
            self.set("cpu_model", model.trim());
            self.set("thread_count", group("thread_count"));
            self.set("memory_amount", group("memory_amount"));
            self.set("cpu_extensions", group("cpu_extensions"));
        }

        let Some(os) = OS_LINE.as_ref().and_then(|re| re.captures(part(2))) else {
            return;
        };
        let field = |name: &str| os.name(name).map_or("", |m| m.as_str()).trim().to_string();
        match field("os_type").to_lowercase().as_str() {
            "windows" => {
                let version = format!(
                    "{}.{}.{}",
                    field("os_version_major"),
                    field("os_version_minor"),
                    field("os_version_build")
                );
                if let Some(name) = Version::parse(&version).and_then(|v| os_names::windows_name(&v)) {
                    self.set("os_windows_version", name);
                }
                self.set("os_type", "Windows");
                self.set("os_version", version);
            }
            "posix" => {
                let name = field("posix_name");
                let release = field("posix_release");
                if let Some(linux) = os_names::linux_name(&name, &release, &field("posix_version")) {
                    self.set("os_linux_version", linux);
                }
                self.set("os_type", name);
                self.set("os_version", release);
            }
            "macos" => {
                let version = field("macos_version");
                let numeric = VERSION_PREFIX
                    .as_ref()
                    .and_then(|re| re.captures(&version))
                    .and_then(|c| c.name("version"))
                    .and_then(|m| Version::parse(m.as_str()));
                if let Some(numeric) = numeric {
                    self.set("os_mac_version", os_names::macos_name(&numeric));
                }
                self.set("os_type", "MacOS");
                self.set("os_version", version);
            }
            _ => {}
        }
    }

    fn canonical_marks(&mut self) {
        for value in self.model.single.values_mut() {
            if value.eq_ignore_ascii_case("true") {
                *value = ENABLED_MARK.to_string();
            } else if value.eq_ignore_ascii_case("false") {
                *value = DISABLED_MARK.to_string();
            }
        }
    }
}

fn reformat_decoder(decoder: &str) -> Option<String> {
    if decoder.is_empty() {
        return None;
    }
    let caps = DECODER.as_ref()?.captures(decoder)?;
    let name = caps.name("name").map_or("", |m| m.as_str()).trim_end();
    let kind = caps.name("type").map_or("", |m| m.as_str());
    Some(if kind.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", name, kind)
    })
}

/// `01.02` → `1.02`; a zero directly before the dot stays.
fn strip_leading_zeros(version: &str) -> String {
    let mut out = version;
    while out.len() > 1 && out.starts_with('0') && out[1..].starts_with(|c: char| c.is_ascii_digit()) {
        out = &out[1..];
    }
    out.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model(pairs: &[(&str, &str)]) -> ExtractionModel {
        let mut m = ExtractionModel::default();
        for (k, v) in pairs {
            m.set(*k, *v);
        }
        m
    }

    fn run(pairs: &[(&str, &str)]) -> NormalizedModel {
        normalize(&model(pairs), &AmdDriverTable::default())
    }

    #[test]
    fn booleans_become_marks() {
        let n = run(&[("vsync", "true"), ("mtrsx", "False"), ("renderer", "Vulkan")]);
        assert_eq!(n.get("vsync"), Some(ENABLED_MARK));
        assert_eq!(n.get("mtrsx"), Some(DISABLED_MARK));
        assert_eq!(n.get("renderer"), Some("Vulkan"));
    }

    #[test]
    fn decoder_labels_are_reformatted() {
        let n = run(&[("ppu_decoder", "Recompiler (LLVM)"), ("spu_decoder", "Interpreter")]);
        assert_eq!(n.get("ppu_decoder"), Some("Recompiler/LLVM"));
        assert_eq!(n.get("spu_decoder"), Some("Interpreter"));
    }

    #[test]
    fn settings_labels() {
        let n = run(&[
            ("strict_rendering_mode", "true"),
            ("spu_threads", "0"),
            ("spu_secondary_cores", "true"),
            ("af_override", "1"),
            ("relaxed_zcull", "true"),
            ("lib_loader", "Load liblv2.sprx and manual selection"),
            ("frame_limit", "60"),
            ("vsync", "true"),
            ("disable_async_shaders", "false"),
            ("rsx_fifo_mode", "\"Fast\""),
            ("cpu_preempt_count", "0"),
        ]);
        assert_eq!(n.get("resolution_scale"), Some("Strict Mode"));
        assert_eq!(n.get("spu_threads"), Some("Auto"));
        assert_eq!(n.get("thread_scheduler"), Some("RPCS3"));
        assert_eq!(n.get("af_override"), Some("Disabled"));
        assert_eq!(n.get("zcull_status"), Some("Relaxed"));
        assert_eq!(n.get("lib_loader"), Some("Liblv2.sprx & manual"));
        assert_eq!(n.get("frame_limit_combined"), Some("60+VSync"));
        assert_eq!(n.get("shader_mode"), Some("Async"));
        assert_eq!(n.get("rsx_fifo_mode"), Some("Fast"));
        assert_eq!(n.get("cpu_preempt_count"), Some("Disabled"));
    }

    #[test]
    fn xfloat_from_legacy_flags() {
        let n = run(&[
            ("accurate_xfloat", "false"),
            ("approximate_xfloat", "false"),
            ("relaxed_xfloat", "true"),
        ]);
        assert_eq!(n.get("xfloat_mode"), Some("Relaxed"));
        let n = run(&[("accurate_xfloat", "false"), ("approximate_xfloat", "true")]);
        assert_eq!(n.get("xfloat_mode"), Some("Approximate"));
        let n = run(&[("accurate_xfloat", "false")]);
        assert_eq!(n.get("xfloat_mode"), Some("[--]"));
    }

    #[test]
    fn gpu_identity_prefers_initialized_device() {
        let mut m = model(&[
            ("vulkan_initialized_device", "NVIDIA GeForce RTX 3070"),
            ("driver_manuf", "NVIDIA Corporation"),
        ]);
        m.push_multi(
            "vulkan_found_device",
            "'NVIDIA GeForce RTX 3070' running on driver 531.79.0.0",
        );
        let n = normalize(&m, &AmdDriverTable::default());
        assert_eq!(n.get("gpu_info"), Some("NVIDIA GeForce RTX 3070 (531.79)"));
        assert_eq!(n.get("gpu_name"), Some("NVIDIA GeForce RTX 3070"));
        assert_eq!(n.get("driver_version_info"), Some("531.79"));
        assert_eq!(n.typed().gpu_vendor, Some(GpuVendor::Nvidia));
    }

    #[test]
    fn discrete_gpu_is_picked_from_available_devices() {
        let mut m = ExtractionModel::default();
        m.push_multi("vulkan_compatible_device_name", "NVIDIA GeForce GTX 1650");
        m.push_multi("vulkan_compatible_device_name", "Intel(R) UHD Graphics 630");
        let n = normalize(&m, &AmdDriverTable::default());
        assert_eq!(n.get("gpu_name"), Some("NVIDIA GeForce GTX 1650"));
        assert_eq!(
            n.get("gpu_available_info"),
            Some("Intel UHD Graphics 630 ()\nNVIDIA GeForce GTX 1650 ()")
        );
    }

    #[test]
    fn amd_lookup_miss_is_reported() {
        let n = run(&[
            ("driver_manuf_new", "AMD Radeon RX 6800"),
            ("driver_version_new", "4.6.14761"),
        ]);
        assert!(n.amd_lookup_missed);
        assert_eq!(n.get("driver_version_info"), Some("4.6.14761"));
    }

    #[test]
    fn os_from_path_style_and_wddm() {
        let n = run(&[("win_path", "C:/rpcs3/"), ("driver_version", "31.0.15.3623")]);
        assert_eq!(n.get("os_type"), Some("Windows"));
        assert_eq!(n.get("os_windows_version"), Some("11 22H2"));
    }

    #[test]
    fn unnamed_windows_build_falls_back_to_wddm_once() {
        let once = run(&[("build_and_specs", UNNAMED_WINDOWS_HEADER), ("driver_version", "31.0.15.3699")]);
        assert_eq!(once.get("os_type"), Some("Windows"));
        assert_eq!(once.get("os_windows_version"), Some("11 22H2"));
        let twice = normalize(&once.model, &AmdDriverTable::default());
        assert_eq!(twice.model, once.model);
    }

    #[test]
    fn named_windows_build_wins_over_wddm() {
        let n = run(&[("build_and_specs", WINDOWS_HEADER), ("driver_version", "27.20.100.8681")]);
        assert_eq!(n.get("os_windows_version"), Some("11 23H2"));
    }

    #[test]
    fn library_lists() {
        let n = run(&[("library_list", "- libvdec.sprx:lle\n- libfs.sprx:hle\n")]);
        assert_eq!(n.get("library_list"), Some("None"));
        assert_eq!(n.get("library_list_lle"), Some("libvdec.sprx"));
        assert_eq!(n.get("library_list_hle"), Some("libfs.sprx"));
        let n = run(&[("library_list", "[libvdec.sprx, libadec.sprx]")]);
        assert_eq!(n.get("library_list"), Some("libvdec.sprx, libadec.sprx"));
        assert_eq!(run(&[]).get("library_list"), Some("None"));
    }

    #[test]
    fn game_version_skips_unknown_and_leading_zero() {
        let n = run(&[("app_version", "Unknown"), ("disc_app_version", "01.02")]);
        assert_eq!(n.get("game_version"), Some("1.02"));
        assert_eq!(strip_leading_zeros("0.5"), "0.5");
    }

    #[test]
    fn multi_value_cleanup() {
        let mut m = ExtractionModel::default();
        m.push_multi("fatal_error", "Texture 'tex00' failed\nsecond line");
        m.push_multi("broken_filename_or_dir", "/PS3_GAME/USRDIR/data.psarc");
        let n = normalize(&m, &AmdDriverTable::default());
        assert_eq!(n.multi("fatal_error"), ["Texture 'tex00' failed"]);
        assert_eq!(n.multi("broken_filename"), ["/PS3_GAME/USRDIR/data.psarc"]);
        assert_eq!(n.multi("broken_directory"), ["/PS3_GAME/USRDIR/data.psarc"]);
    }

    #[test]
    fn disc_serial_booted_from_psn_folder_is_rewritten() {
        let n = run(&[("serial", "BLUS30443"), ("ldr_game_serial", "NPUB30910")]);
        assert_eq!(n.get("serial"), Some("NPUB30910"));
        assert_eq!(n.get("disc_to_psn_serial"), Some("BLUS30443"));
        assert_eq!(n.get("game_category"), Some("HG"));
        let n = run(&[("serial", "BLUS30443"), ("ldr_game_serial", "BLUS30443")]);
        assert_eq!(n.get("serial"), Some("BLUS30443"));
    }

    const WINDOWS_HEADER: &str = "RPCS3 v0.0.29-15470-2f5e4e1c Alpha | master | Firmware version: 4.9\n\
        Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz | 8 Threads | 31.93 GiB RAM | TSC: 3.600GHz | AVX2, FMA3\n\
        Operating system: Windows, Major: 10, Minor: 0, Build: 22631, Service Pack: none, Compatibility mode: 0";

    /// Windows 10 technical preview: `windows_name` has no name for 6.4.
    const UNNAMED_WINDOWS_HEADER: &str = "RPCS3 v0.0.29-15470-2f5e4e1c Alpha | master\n\
        Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz | 8 Threads | 31.93 GiB RAM | TSC: 3.600GHz | AVX2\n\
        Operating system: Windows, Major: 6, Minor: 4, Build: 9841, Service Pack: none, Compatibility mode: 0";

    const LINUX_HEADER: &str = "RPCS3 v0.0.30-15800-abcdef12 Alpha | HEAD\n\
        AMD Ryzen 7 5800X 8-Core Processor | 16 Threads | 31.27 GiB RAM | AVX2\n\
        Operating system: POSIX, Name: Linux, Release: 6.5.0-14-generic, Version: #14~22.04.1-Ubuntu SMP";

    #[test]
    fn build_line_fields() {
        let n = run(&[("build_and_specs", WINDOWS_HEADER)]);
        assert_eq!(n.get("build_branch"), Some("master"));
        assert_eq!(n.get("build_commit"), Some("2f5e4e1c"));
        assert_eq!(n.get("build_full_version"), Some("0.0.29.15470"));
        assert_eq!(n.rpcs3_version(), Some(Version::full(0, 0, 29, 15470)));
        assert_eq!(n.get("fw_version_installed"), Some("4.90"));
        assert_eq!(n.get("cpu_model"), Some("Intel Core i7-9700K"));
        assert_eq!(n.get("thread_count"), Some("8"));
        assert_eq!(n.get("cpu_extensions"), Some("AVX2, FMA3"));
        assert_eq!(n.get("os_type"), Some("Windows"));
        assert_eq!(n.get("os_version"), Some("10.0.22631"));
        assert_eq!(n.get("os_windows_version"), Some("11 23H2"));
        assert!(n.get("log_from_ui").is_none());
        let typed = n.typed();
        assert_eq!(typed.os_family, Some(OsFamily::Windows));
        assert_eq!(typed.thread_count, Some(8));
    }

    #[test]
    fn typed_view_serializes() {
        let n = run(&[("build_and_specs", WINDOWS_HEADER), ("renderer", "Vulkan")]);
        let value = serde_json::to_value(n.typed()).unwrap();
        assert_eq!(value["build_version"], "0.0.29.15470");
        assert_eq!(value["thread_count"], 8);
    }

    #[test]
    fn posix_os_line() {
        let header = "RPCS3 v0.0.30-15800-abcdef12 Alpha | HEAD\n\
            AMD Ryzen 7 5800X 8-Core Processor | 16 Threads | 31.27 GiB RAM | AVX2\n\
            Operating system: POSIX, Name: Linux, Release: 6.5.0-14-generic, Version: #14~22.04.1-Ubuntu SMP";
        let n = run(&[("build_and_specs", header)]);
        assert_eq!(n.get("os_type"), Some("Linux"));
        assert_eq!(n.get("os_version"), Some("6.5.0-14-generic"));
        assert_eq!(n.get("os_linux_version"), Some("Ubuntu 6.5.0"));
        assert_eq!(n.get("cpu_model"), Some("AMD Ryzen 7 5800X"));
    }

    #[test]
    fn ui_copied_header_is_flagged() {
        let n = run(&[("build_and_specs", "some text\nRPCS3 v0.0.29\na\nb\nc")]);
        assert_eq!(n.get("log_from_ui"), Some(ENABLED_MARK));
    }

    #[test]
    fn renormalizing_is_a_no_op() {
        let once = run(&[
            ("build_and_specs", WINDOWS_HEADER),
            ("vsync", "true"),
            ("frame_limit", "Off"),
            ("library_list", "- libvdec.sprx:lle\n"),
            ("shader_mode", "Async Shader Recompiler"),
            ("app_version", "01.00"),
        ]);
        let twice = normalize(&once.model, &AmdDriverTable::default());
        assert_eq!(once.model, twice.model);
    }

    fn source_model() -> impl Strategy<Value = ExtractionModel> {
        let boolean = prop::sample::select(vec!["true", "false", "True", ENABLED_MARK, DISABLED_MARK]);
        let pairs = (
            prop::option::of(boolean.clone()),
            prop::option::of(boolean.clone()),
            prop::option::of(boolean.clone()),
            prop::option::of(prop::sample::select(vec!["0", "1", "16", "Auto"])),
            prop::option::of(prop::sample::select(vec![
                "Recompiler (LLVM)",
                "Interpreter (static)",
                "Recompiler/LLVM",
            ])),
            prop::option::of(prop::sample::select(vec!["Off", "60", "Auto"])),
            prop::option::of(prop::sample::select(vec![
                "- libvdec.sprx:lle\n",
                "[libfs.sprx]",
                "None",
                "[]",
            ])),
            prop::option::of(prop::sample::select(vec!["01.02", "1.00", "Unknown", "001.10"])),
            prop::option::of(prop::sample::select(vec![
                "Auto",
                "Load liblv2.sprx only",
                "Manually load selected libraries",
                "Load automatic and manual selection",
            ])),
            prop::option::of(prop::sample::select(vec!["4.8", "4.90", "4.81"])),
            prop::sample::select(vec![
                WINDOWS_HEADER,
                UNNAMED_WINDOWS_HEADER,
                LINUX_HEADER,
                "RPCS3 v0.0.29-15470-2f5e4e1c Alpha | master",
            ]),
            (
                prop::option::of(prop::sample::select(vec!["31.0.15.3699", "27.20.100.8681", "537.58", "garbage"])),
                prop::option::of(prop::sample::select(vec!["4.6.14761", "31.0.101.5186"])),
                prop::option::of(prop::sample::select(vec!["C:/rpcs3/", "/home/user/rpcs3/"])),
            ),
        );
        pairs.prop_map(|(vsync, zcull, relaxed, af, decoder, limit, libs, app, loader, fw, header, (driver, driver_new, path))| {
            let mut m = ExtractionModel::default();
            let mut put = |k: &str, v: Option<&str>| {
                if let Some(v) = v {
                    m.set(k, v);
                }
            };
            put("vsync", vsync);
            put("zcull", zcull);
            put("relaxed_xfloat", relaxed);
            put("af_override", af);
            put("ppu_decoder", decoder);
            put("frame_limit", limit);
            put("library_list", libs);
            put("app_version", app);
            put("lib_loader", loader);
            put("fw_version_installed", fw);
            put("driver_version", driver);
            put("driver_version_new", driver_new);
            let path_key = match path {
                Some(p) if p.starts_with("C:") => "win_path",
                _ => "lin_path",
            };
            put(path_key, path);
            put("build_and_specs", Some(header));
            m
        })
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in source_model()) {
            let table = AmdDriverTable::default();
            let once = normalize(&raw, &table);
            let twice = normalize(&once.model, &table);
            prop_assert_eq!(once.model, twice.model);
        }

        #[test]
        fn normalize_never_drops_keys(raw in source_model()) {
            let once = normalize(&raw, &AmdDriverTable::default());
            for key in raw.single.keys() {
                prop_assert!(once.model.single.contains_key(key));
            }
        }
    }
}
