//! Log section table: triggers, patterns and section boundaries.
//!
//! A log is read as a sequence of sections. Each section owns a set of
//! extractors keyed by a trigger string. When the first line of the sliding
//! window contains a trigger, the associated pattern runs over the whole
//! window and every non-blank named capture is stored under the capture name.
//!
//! ```text
//!  0 header ──"Used configuration:"──▶ 1 Core ──"VFS:"──▶ 2 VFS ──"Video:"──▶ 3 Video
//!      ▲                                                                      │
//!      │                                                                  "Audio:"
//!      │                                                                      ▼
//!  6 body ◀──"·" (complete)── 5 Log ◀──"Log:"── 4 Audio / Input / System ◀────┘
//!      │
//!      └── "Stopping emulator..." etc.: complete, reset, back to 0
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// What happens when a section's end trigger is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEnd {
    /// Move on to the next section.
    Next,
    /// Promote the work-in-progress values to the completed set.
    MarkComplete,
    /// Promote, start a fresh run keeping [`PERSISTENT_KEYS`], and return to section 0.
    MarkCompleteAndReset,
}

/// Post-match filter standing in for negative lookahead.
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    None,
    /// Drop matches whose text contains this string.
    MatchExcludes(&'static str),
    /// Drop matches where the group value starts with this prefix.
    GroupNotPrefixed(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Store captures as values.
    Values,
    /// Record `syscall_name` under the current serial.
    Syscalls,
}

#[derive(Debug)]
pub struct Extractor {
    pub trigger: &'static str,
    pub regex: Regex,
    pub guard: Guard,
    pub kind: ExtractorKind,
}

impl Extractor {
    /// Whether a match survives the guard.
    pub fn accepts(&self, caps: &regex::Captures<'_>) -> bool {
        match self.guard {
            Guard::None => true,
            Guard::MatchExcludes(needle) => caps
                .get(0)
                .map_or(true, |m| !m.as_str().contains(needle)),
            Guard::GroupNotPrefixed(group, prefix) => caps
                .name(group)
                .map_or(true, |m| !m.as_str().starts_with(prefix)),
        }
    }
}

#[derive(Debug)]
pub struct Section {
    pub extractors: Vec<Extractor>,
    /// Lowercased; matched case-insensitively anywhere in a line.
    pub end_triggers: Vec<String>,
    pub on_end: SectionEnd,
}

impl Section {
    pub fn is_end(&self, line: &str) -> bool {
        if self.end_triggers.is_empty() {
            return false;
        }
        let lower = line.to_lowercase();
        self.end_triggers.iter().any(|t| lower.contains(t.as_str()))
    }
}

/// Keys whose values accumulate instead of overwriting.
pub const MULTI_VALUE_KEYS: &[&str] = &[
    "pad_handler",
    "pad_controller_name",
    "pad_has_gyro",
    "fatal_error_context",
    "fatal_error",
    "rap_file",
    "vulkan_found_device",
    "vulkan_compatible_device_name",
    "ppu_patch",
    "ovl_patch",
    "spu_patch",
    "prx_patch",
    "patch_desc",
    "broken_filename_or_dir",
    "broken_filename",
    "broken_digital_filename",
    "broken_directory",
    "edat_block_offset",
    "failed_to_verify_npdrm",
    "failed_to_decrypt_edat",
    "rsx_not_supported_feature",
    "vk_ext",
    "gl_ext",
    "verification_error_hex",
    "verification_error",
    "tty_line",
];

/// Keys whose occurrences are counted.
pub const COUNT_VALUE_KEYS: &[&str] = &["enqueue_buffer_error"];

/// Values carried from one emulator run into the next when a log holds several.
pub const PERSISTENT_KEYS: &[&str] = &[
    "build_and_specs",
    "fw_version_installed",
    "log_start_timestamp",
    "hw_id",
    "os_type",
    "posix_name",
    "posix_release",
    "posix_version",
    "macos_version",
    "os_version_major",
    "os_version_minor",
    "os_version_build",
    "os_service_pack",
    "os_compat_mode",
    "first_unicode_dot",
    "vulkan_gpu",
    "d3d_gpu",
    "driver_version",
    "driver_manuf",
    "driver_manuf_new",
    "driver_version_new",
    "vulkan_found_device",
    "vulkan_compatible_device_name",
    "vulkan_driver_version_raw",
    "compat_database_path",
];

pub fn is_multi_value(key: &str) -> bool {
    MULTI_VALUE_KEYS.contains(&key)
}

pub fn is_counted(key: &str) -> bool {
    COUNT_VALUE_KEYS.contains(&key)
}

/// Capture names may carry a `__suffix` so two groups can feed one key.
pub fn storage_key(group: &str) -> &str {
    group.split("__").next().unwrap_or(group)
}

pub const OS_INFO: &str = r"(?m)Operating system: (?<os_type>[^,]+), (Name: (?<posix_name>[^,]+), Release: (?<posix_release>[^,]+), Version: (?<posix_version>[^\r\n]+)|Major: (?<os_version_major>\d+), Minor: (?<os_version_minor>\d+), Build: (?<os_version_build>\d+), Service Pack: (?<os_service_pack>[^,]+), Compatibility mode: (?<os_compat_mode>[^,\r\n]+)|Version: (?<macos_version>[^\r\n]+))\r?$";

const GAME_PATH: &str = r"Game: (?<ldr_game_full>.*(?<ldr_game>/dev_hdd0/game/(?<ldr_game_serial>[^/\r\n]+)).*|.*)\r?$";
const DIGITAL_PATH: &str = r"Path: (?<ldr_path_full>.*(?<ldr_path>/dev_hdd0/game/(?<ldr_path_serial>[^/\r\n]+)).*|.*)\r?$";
const BOOT_PATH_IN_BODY: &str = r"Boot path: (?<ldr_boot_path_full>.*(?<ldr_boot_path>/dev_hdd0/game/(?<ldr_boot_path_serial>[^/\r\n]+)).*|.*)\r?$";
const CACHE_OR_BOOT_STYLE: &str = r"((?<win_path>\w:/)|(?<lin_path>/[^/])).*?\r?$";
const DISC_VERSION: &str = r"Version: (APP_VER=)?(?<disc_app_version>\S+) (/ |VERSION=)(?<disc_package_version>\S+).*?\r?$";
const PHYSICAL_DEVICE: &str = r"Physical device ini?tialized\. GPU=(?<vulkan_gpu>.+), driver=(?<vulkan_driver_version_raw>-?\d+)\r?$";

/// Builds one section from `(trigger, pattern)` pairs.
///
/// A pattern that does not compile is logged and left out so one bad entry
/// cannot disable the whole table.
fn section(
    entries: Vec<(&'static str, String, Guard, ExtractorKind)>,
    end_triggers: &[&str],
    on_end: SectionEnd,
) -> Section {
    let mut extractors = Vec::with_capacity(entries.len());
    for (trigger, pattern, guard, kind) in entries {
        match Regex::new(&pattern) {
            Ok(regex) => extractors.push(Extractor {
                trigger,
                regex,
                guard,
                kind,
            }),
            Err(e) => tracing::error!(trigger, error = %e, "log pattern failed to compile"),
        }
    }
    Section {
        extractors,
        end_triggers: end_triggers.iter().map(|t| t.to_lowercase()).collect(),
        on_end,
    }
}

/// Multiline pattern: `^`/`$` anchor at line boundaries.
fn m(trigger: &'static str, pattern: &str) -> (&'static str, String, Guard, ExtractorKind) {
    (trigger, format!("(?m){}", pattern), Guard::None, ExtractorKind::Values)
}

/// Singleline pattern: `.` crosses lines, `$` is the end of the window.
fn s(trigger: &'static str, pattern: &str) -> (&'static str, String, Guard, ExtractorKind) {
    (trigger, format!("(?s){}", pattern), Guard::None, ExtractorKind::Values)
}

fn guarded(
    (trigger, pattern, _, kind): (&'static str, String, Guard, ExtractorKind),
    guard: Guard,
) -> (&'static str, String, Guard, ExtractorKind) {
    (trigger, pattern, guard, kind)
}

fn syscalls(trigger: &'static str, pattern: &str) -> (&'static str, String, Guard, ExtractorKind) {
    (trigger, format!("(?m){}", pattern), Guard::None, ExtractorKind::Syscalls)
}

pub static SECTIONS: Lazy<Vec<Section>> = Lazy::new(build_sections);

fn build_sections() -> Vec<Section> {
    vec![
        section(
            vec![
                s("RPCS3 v", r"(^|.+\d:\d\d:\d\d\.\d{6})\s*(?<build_and_specs>RPCS3 [^\xC2\xB7]+?)\r?(\n·|$)"),
                m("0:00:00.0", r"(?<first_unicode_dot>·).+\r?$"),
                ("Operating system:", OS_INFO.to_string(), Guard::None, ExtractorKind::Values),
                m("Current Time:", r"Current Time: (?<log_start_timestamp>.+)\r?$"),
                m("Installation ID:", r"Installation ID: (?<hw_id>.+)\r?$"),
                m("Physical device in", PHYSICAL_DEVICE),
                m("Found vulkan-compatible GPU:", r"Found [Vv]ulkan-compatible GPU: (?<vulkan_found_device>'(?<vulkan_compatible_device_name>.+)' running.+)\r?$"),
                m("Finished reading database from file:", r"Finished reading database from file: (?<compat_database_path>.*compat_database.dat).*\r?$"),
                m("Database file not found:", r"Database file not found: (?<compat_database_path>.*compat_database.dat).*\r?$"),
                m("Successfully installed PS3 firmware", r"(?<fw_installed_message>Successfully installed PS3 firmware) version (?<fw_version_installed>\d+\.\d+).*\r?$"),
                m("Firmware version:", r"Firmware version: (?<fw_version_installed>\d+\.\d+).*\r?$"),
                m("Title:", r"(?:LDR|SYS): Title: (?<game_title>.*)?\r?$"),
                m("Serial:", r"Serial: (?<serial>[A-z]{4}\d{5})\r?$"),
                m("Category:", r"Category: (?<game_category>.*)?\r?$"),
                m("LDR: Version:", r"Version: (?<disc_app_version>\S+) / (?<disc_package_version>\S+).*?\r?$"),
                m("SYS: Version:", DISC_VERSION),
                m("LDR: Cache", &format!("Cache: {}", CACHE_OR_BOOT_STYLE)),
                m("SYS: Cache", &format!("Cache: {}", CACHE_OR_BOOT_STYLE)),
                m("LDR: Path", &format!("Path: {}", CACHE_OR_BOOT_STYLE)),
                m("SYS: Path", &format!("Path: {}", CACHE_OR_BOOT_STYLE)),
                m("LDR: Path:", DIGITAL_PATH),
                m("SYS: Path:", DIGITAL_PATH),
                m("custom config:", r"custom config: (?<custom_config>.*?)\r?$"),
                m("patch_log: Failed to load patch file", r"patch_log: Failed to load patch file (?<patch_error_file>\S*)\r?\n.* line (?<patch_error_line>\d+), column (?<patch_error_column>\d+): (?<patch_error_text>.*?)$"),
            ],
            &["Used configuration:"],
            SectionEnd::Next,
        ),
        section(
            vec![
                m("PPU Decoder:", r"PPU Decoder: (?<ppu_decoder>.*?)\r?$"),
                m("PPU Threads:", r"PPU Threads: (?<ppu_threads>.*?)\r?$"),
                m("Use LLVM CPU:", r#"Use LLVM CPU: "?(?<llvm_arch>.*?)"?\r?$"#),
                m("cheduler", r"[Ss]cheduler( Mode)?: (?<thread_scheduler>.*?)\r?$"),
                m("SPU Decoder:", r"SPU Decoder: (?<spu_decoder>.*?)\r?$"),
                m("Disable SPU GETLLAR Spin Optimization:", r"Disable SPU GETLLAR Spin Optimization: (?<disable_getllar_spin_optimization>.*?)\r?$"),
                m("secondary cores:", r"secondary cores: (?<spu_secondary_cores>.*?)\r?$"),
                m("SPU Threads:", r"SPU Threads: (?<spu_threads>.*?)\r?$"),
                m("SPU delay penalty:", r"SPU delay penalty: (?<spu_delay_penalty>.*?)\r?$"),
                m("SPU loop detection:", r"SPU loop detection: (?<spu_loop_detection>.*?)\r?$"),
                m("Max SPURS Threads:", r"Max SPURS Threads: (?<spurs_threads>\d*?)\r?$"),
                m("SPU Block Size:", r"SPU Block Size: (?<spu_block_size>.*?)\r?$"),
                m("Enable TSX:", r"Enable TSX: (?<enable_tsx>.*?)\r?$"),
                m("Accurate xfloat:", r"Accurate xfloat: (?<accurate_xfloat>.*?)\r?$"),
                m("Approximate xfloat:", r"Approximate xfloat: (?<approximate_xfloat>.*?)\r?$"),
                m("Relaxed xfloat:", r"Relaxed xfloat: (?<relaxed_xfloat>.*?)\r?$"),
                m("XFloat Accuracy:", r"XFloat Accuracy: (?<xfloat_mode>.*?)\r?$"),
                m("Accurate GETLLAR:", r"Accurate GETLLAR: (?<accurate_getllar>.*?)\r?$"),
                m("Accurate PUTLLUC:", r"Accurate PUTLLUC: (?<accurate_putlluc>.*?)\r?$"),
                m("Accurate RSX reservation access:", r"Accurate RSX reservation access: (?<accurate_rsx_reservation>.*?)\r?$"),
                m("RSX FIFO Accuracy:", r"RSX FIFO Accuracy: (?<rsx_fifo_mode>.*?)\r?$"),
                m("Debug Console Mode:", r"Debug Console Mode: (?<debug_console_mode>.*?)\r?$"),
                m("Lib Loader:", r"[Ll]oader: (?<lib_loader>.*?)\r?$"),
                m("Hook static functions:", r"Hook static functions: (?<hook_static_functions>.*?)\r?$"),
                m("Load libraries:", r"libraries:\r?\n(?<library_list>(.*?(- .*?|\[\])\r?\n)+)"),
                m("Libraries Control:", r"Libraries Control:\r?\n(?<library_list>(.*?(- .*?|\[\])\r?\n)+)"),
                m("HLE lwmutex:", r"HLE lwmutex: (?<hle_lwmutex>.*?)\r?$"),
                m("Clocks scale:", r"Clocks scale: (?<clock_scale>.*?)\r?$"),
                m("Max CPU Preempt Count:", r"Max CPU Preempt Count: (?<cpu_preempt_count>.*?)\r?$"),
                m("Sleep Timers Accuracy:", r"Sleep Timers Accuracy: (?<sleep_timer>.*?)\r?$"),
            ],
            &["VFS:"],
            SectionEnd::Next,
        ),
        section(
            vec![m("Enable /host_root/:", r"Enable /host_root/: (?<host_root>.*?)\r?$")],
            &["Video:"],
            SectionEnd::Next,
        ),
        section(
            vec![
                m("Renderer:", r"Renderer: (?<renderer>.*?)\r?$"),
                m("Resolution:", r"Resolution: (?<resolution>.*?)\r?$"),
                m("Aspect ratio:", r"Aspect ratio: (?<aspect_ratio>.*?)\r?$"),
                m("Frame limit:", r"Frame limit: (?<frame_limit>.*?)\r?$"),
                m("MSAA:", r"MSAA: (?<msaa>.*?)\r?$"),
                m("Write Color Buffers:", r"Write Color Buffers: (?<write_color_buffers>.*?)\r?$"),
                m("Write Depth Buffer:", r"Write Depth Buffer: (?<write_depth_buffer>.*?)\r?$"),
                m("Read Color Buffers:", r"Read Color Buffers: (?<read_color_buffers>.*?)\r?$"),
                m("Read Depth Buffer:", r"Read Depth Buffer: (?<read_depth_buffer>.*?)\r?$"),
                m("VSync:", r"VSync: (?<vsync>.*?)\r?$"),
                m("GPU texture scaling:", r"Use GPU texture scaling: (?<gpu_texture_scaling>.*?)\r?$"),
                m("Stretch To Display Area:", r"Stretch To Display Area: (?<stretch_to_display>.*?)\r?$"),
                m("Strict Rendering Mode:", r"Strict Rendering Mode: (?<strict_rendering_mode>.*?)\r?$"),
                m("Occlusion Queries:", r"Occlusion Queries: (?<zcull>.*?)\r?$"),
                m("Vertex Cache:", r"Disable Vertex Cache: (?<vertex_cache>.*?)\r?$"),
                m("Frame Skip:", r"Enable Frame Skip: (?<frame_skip>.*?)\r?$"),
                m("Blit:", r"Blit: (?<cpu_blit>.*?)\r?$"),
                m("Disable Asynchronous Shader Compiler:", r"Disable Asynchronous Shader Compiler: (?<disable_async_shaders>.*?)\r?$"),
                m("Shader Mode:", r"Shader Mode: (?<shader_mode>.*?)\r?$"),
                m("Disable native float16 support:", r"Disable native float16 support: (?<disable_native_float16>.*?)\r?$"),
                m("Multithreaded RSX:", r"Multithreaded RSX: (?<mtrsx>.*?)\r?$"),
                m("Relaxed ZCULL Sync:", r"Relaxed ZCULL Sync: (?<relaxed_zcull>.*?)\r?$"),
                m("Resolution Scale:", r"Resolution Scale: (?<resolution_scale>.*?)\r?$"),
                m("Anisotropic Filter", r"Anisotropic Filter Override: (?<af_override>.*?)\r?$"),
                m("Scalable Dimension:", r"Minimum Scalable Dimension: (?<texture_scale_threshold>.*?)\r?$"),
                m("Driver Recovery Timeout:", r"Driver Recovery Timeout: (?<driver_recovery_timeout>.*?)\r?$"),
                m("Driver Wake-Up Delay:", r"Driver Wake-Up Delay: (?<driver_wakeup_delay>.*?)\r?$"),
                m("Vblank Rate:", r"Vblank Rate: (?<vblank_rate>.*?)\r?$"),
                m("12:", r"(D3D12|DirectX 12):\s*\r?\n\s*Adapter: (?<d3d_gpu>.*?)\r?$"),
                m("Vulkan:", r"Vulkan:\s*\r?\n\s*Adapter: (?<vulkan_gpu>.*?)\r?$"),
                m("Force FIFO present mode:", r"Force FIFO present mode: (?<force_fifo_present>.*?)\r?$"),
                m("Asynchronous Texture Streaming", r"Asynchronous Texture Streaming( 2)?: (?<async_texture_streaming>.*?)\r?$"),
                m("Asynchronous Queue Scheduler:", r"Asynchronous Queue Scheduler: (?<async_queue_scheduler>.*?)\r?$"),
            ],
            &["Audio:"],
            SectionEnd::Next,
        ),
        section(
            vec![
                m("Renderer:", r"Renderer: (?<audio_backend>.*?)\r?$"),
                m("Downmix to Stereo:", r"Downmix to Stereo: (?<audio_stereo>.*?)\r?$"),
                m("Master Volume:", r"Master Volume: (?<audio_volume>.*?)\r?$"),
                m("Enable Buffering:", r"Enable Buffering: (?<audio_buffering>.*?)\r?$"),
                m("Desired Audio Buffer Duration:", r"Desired Audio Buffer Duration: (?<audio_buffer_duration>.*?)\r?$"),
                m("Enable Time Stretching:", r"Enable Time Stretching: (?<audio_stretching>.*?)\r?$"),
                m("Pad:", r"Pad: (?<pad_handler>.*?)\r?$"),
                m("Automatically start games after boot:", r"Automatically start games after boot: (?<auto_start_on_boot>.*?)\r?$"),
                m("Always start after boot:", r"Always start after boot: (?<always_start_on_boot>.*?)\r?$"),
                m("Use native user interface:", r"Use native user interface: (?<native_ui>.*?)\r?$"),
                m("Silence All Logs:", r"Silence All Logs: (?<disable_logs>.*?)\r?$"),
            ],
            &["Log:"],
            SectionEnd::Next,
        ),
        section(
            vec![m("Log:", r"Log:\s*\r?\n?\s*(\{(?<log_disabled_channels>.*?)\}|(?<log_disabled_channels_multiline>(\s+\w+:\s*\w+\r?\n)+))\r?$")],
            &["·"],
            SectionEnd::MarkComplete,
        ),
        section(
            vec![
                m("LDR: Game:", GAME_PATH),
                m("LDR: Disc", r"Disc( path)?: (?<ldr_disc_full>.*(?<ldr_disc>/dev_hdd0/game/(?<ldr_disc_serial>[^/\r\n]+)).*|.*)\r?$"),
                m("LDR: Path:", DIGITAL_PATH),
                m("LDR: Boot path:", BOOT_PATH_IN_BODY),
                m("SYS: Game:", GAME_PATH),
                m("SYS: Path:", DIGITAL_PATH),
                m("SYS: Boot path:", BOOT_PATH_IN_BODY),
                m("Elf path:", r"Elf path: (?<host_root_in_boot>/host_root/)?(?<elf_boot_path_full>(?<elf_boot_path>/dev_hdd0/game/(?<elf_boot_path_serial>[^/\r\n]+)/USRDIR/EBOOT\.BIN|.*?))\r?$"),
                m("VFS: Mounted path \"/dev_bdvd\"", r#"Mounted path "/dev_bdvd" to "(?<mounted_dev_bdvd>[^"]+)""#),
                m("Invalid or unsupported file format:", r"Invalid or unsupported file format: (?<failed_to_boot>.*?)\r?$"),
                m("SELF:", r"(?<failed_to_decrypt>Failed to decrypt)? SELF: (?<failed_to_decrypt__self>Failed to (decrypt|load SELF))?.*\r?$"),
                m("SYS: Version:", DISC_VERSION),
                m("sceNp: npDrmIsAvailable(): Failed to verify", r"Failed to verify (?<failed_to_verify_npdrm>(sce|npd)) file.*\r?$"),
                m("Failed to decrypt '", r"Failed to decrypt '(?<failed_to_decrypt_edat>[^']+\.edat)'.*\r?$"),
                m("{rsx::thread} RSX: 4", RSX_DRIVER_INFO_LEGACY),
                m("{rsx::thread} RSX: 3", RSX_DRIVER_INFO_LEGACY),
                m("GL RENDERER:", r"GL RENDERER: (?<driver_manuf_new>.*?)\r?$"),
                m("GL VERSION:", r"GL VERSION: (?<opengl_version>(\d|\.)+)(\d|\.|\s|\w|-)*?( (?<driver_version_new>(\d+\.)*\d+))?\r?$"),
                m("GLSL VERSION:", r"GLSL VERSION: (?<glsl_version>(\d|\.)+).*?\r?$"),
                m("texel buffer size reported:", r"RSX: Supported texel buffer size reported: (?<texel_buffer_size_new>\d*?) bytes"),
                m("Physical device in", PHYSICAL_DEVICE),
                m("Found vulkan-compatible GPU:", r"Found [Vv]ulkan-compatible GPU: (?<vulkan_found_device>.+)\r?$"),
                m("Renderer initialized on device", r"Renderer initialized on device '(?<vulkan_initialized_device>.+)'\r?$"),
                m("RSX: Failed to compile shader", r"RSX: Failed to compile shader: ERROR: (?<shader_compile_error>.+?)\r?$"),
                m("RSX: Compilation failed", r"RSX: Compilation failed: ERROR: (?<shader_compile_error>.+?)\r?$"),
                m("RSX: Linkage failed", r"RSX: Linkage failed: (?<shader_compile_error>.+?)\r?$"),
                m("RSX: Unsupported device", r"RSX: Unsupported device: (?<rsx_unsupported_gpu>.+)\..+?\r?$"),
                m("RSX: Your GPU does not support", r"RSX: Your GPU does not support (?<rsx_not_supported_feature>.+)\..+?\r?$"),
                m("RSX: GPU/driver lacks support", r"RSX: GPU/driver lacks support for (?<rsx_not_supported_feature>.+)\..+?\r?$"),
                m("RSX: Swapchain:", r"RSX: Swapchain: present mode (?<rsx_swapchain_mode>\d+?) in use.+?\r?$"),
                m("RSX: ** Using", r"RSX: \*\* Using (?<vk_ext>\w+?)\r?$"),
                m("RSX: [CAPS] Using", r"RSX: \[CAPS\] Using (?<gl_ext>\w+?)\r?$"),
                s("F ", r"F \d+:\d+:\d+\.\d+ ((\{(?<fatal_error_context>[^}]+)\} )?(\w+:\s*(Thread terminated due to fatal error: )?|(\w+:\s*)?(class [^\r\n]+ thrown: ))\r?\n?)(?<fatal_error>.*?)(\r?\n)(\r?\n|·|$)"),
                m("Failed to load RAP file:", r"Failed to load RAP file: (?<rap_file>.*?\.rap).*\r?$"),
                m("Failed to locate the game license file:", r"Failed to locate the game license file: (?<rap_file>.*?\.rap).*\r?$"),
                m("Rap file not found:", r"Rap file not found: “?(?<rap_file>.*?\.rap)”?\r?$"),
                m("Pad handler expected but none initialized", r"(?<native_ui_input>Pad handler expected but none initialized).*?\r?$"),
                m("Failed to bind device", r"Failed to bind device (?<failed_pad>.+) to handler (?<failed_pad_handler>.+).*\r?$"),
                m("Input:", r"Input: (?<pad_handler>.*?) device .+ connected\r?$"),
                m("XAudio2Thread", r"XAudio2Thread\s*: (?<xaudio_init_error>.+failed\s*\((?<xaudio_error_code>0x.+)\).*)\r?$"),
                m("cellAudio Thread", r"XAudio2Backend\s*: (?<xaudio_init_error>.+failed\s*\((?<xaudio_error_code>0x.+)\).*)\r?$"),
                m("using a Null renderer instead", r"Audio renderer (?<audio_backend_init_error>.+) could not be initialized\r?$"),
                m("PPU executable hash:", r"PPU executable hash: PPU-(?<ppu_patch>\w+( \(<-\s*\d+\))?).*?\r?$"),
                m("OVL executable hash:", r"OVL executable hash: OVL-(?<ovl_patch>\w+( \(<-\s*\d+\))?).*?\r?$"),
                m("SPU executable hash:", r"SPU executable hash: SPU-(?<spu_patch>\w+( \(<-\s*\d+\))?).*?\r?$"),
                m("PRX library hash:", r"PRX library hash: PRX-(?<prx_patch>\w+-\d+( \(<-\s*\d+\))?).*?\r?$"),
                m("OVL hash of", r"OVL hash of (\w|[.\[\]])+: OVL-(?<ovl_patch>\w+( \(<-\s*\d+\))?).*?\r?$"),
                m("PRX hash of", r"PRX hash of (\w|[.\[\]])+: PRX-(?<prx_patch>\w+-\d+( \(<-\s*\d+\))?).*?\r?$"),
                m(": Applied patch", r"Applied patch \(hash='(?:\w{3}-\w+(-\d+)?)', description='(?<patch_desc>.+?)', author='(?:.+?)', patch_version='(?:.+?)', file_version='(?:.+?)'\) \(<- (?:[1-9]\d*)\).*\r?$"),
                m("Loaded SPU image:", r"Loaded SPU image: SPU-(?<spu_patch>\w+ \(<-\s*\d+\)).*?\r?$"),
                guarded(
                    m("'sys_fs_stat' failed", r"'sys_fs_stat' failed .+“(/dev_bdvd/(?<broken_filename_or_dir>.+)|/dev_hdd0/game/NP\w+/(?<broken_digital_filename>.+))”.*?\r?$"),
                    Guard::MatchExcludes("failed with 0x8001002c"),
                ),
                guarded(
                    m("'sys_fs_open' failed", r"'sys_fs_open' failed .+“(/dev_bdvd/(?<broken_filename>.+)|/dev_hdd0/game/NP\w+/(?<broken_digital_filename>.+))”.*?\r?$"),
                    Guard::MatchExcludes("failed with 0x8001002c"),
                ),
                m("'sys_fs_opendir' failed", r"'sys_fs_opendir' failed .+“/dev_bdvd/(?<broken_directory>.+)”.*?\r?$"),
                m("EDAT: ", r"EDAT: Block at offset (?<edat_block_offset>0x[0-9a-f]+) has invalid hash!.*?\r?$"),
                m("PS3 firmware is not installed", r"(?<fw_missing_msg>PS3 firmware is not installed.+)\r?$"),
                m("do you have the PS3 firmware installed", r"(?<fw_missing_something>do you have the PS3 firmware installed.*)\r?$"),
                m("Unimplemented syscall", r"U \d+:\d+:\d+\.\d+ (\{(?<unimplemented_syscall_context>.+?)\} )?.*Unimplemented syscall (?<unimplemented_syscall>.*)\r?$"),
                m("Could not enqueue", r"cellAudio: Could not enqueue buffer onto audio backend(?<enqueue_buffer_error>.).*\r?$"),
                syscalls("{PPU[", r"\{PPU\[.+\]\} (?<log_channel>[^ :]+)( TODO)?: (?<syscall_name>[^ :“][^ :]*?)\(.*\r?$"),
                m("Verification failed", r"Verification failed.+\(e=0x(?<verification_error_hex>[0-9a-f]+)\[(?<verification_error>\d+)\]\)"),
                s("sys_tty_write():", r"sys_tty_write\(\): “(?<tty_line>.*?)”\r?(\n|$)"),
                syscalls("⁂", r"⁂ (?<syscall_name>[^ :\[]+?) .*\r?$"),
                m("undub", r"(?i)(\b|_)(?<game_mod>(undub|translation patch))(\b|_)"),
                guarded(
                    m("Input: Pad", r"Input: Pad (?<pad_id>\d): device='(?<pad_controller_name>.+?)', handler=(?<pad_handler>.+?), VID=.+?\r?$"),
                    Guard::GroupNotPrefixed("pad_controller_name", "Null"),
                ),
                m("SDL: Found game controller", r"Found game controller \d: .+ has_accel=(?<pad_has_accel>.+?), has_gyro=(?<pad_has_gyro>.+?)\r?$"),
            ],
            &["Stopping emulator...", "All threads stopped...", "LDR: Booting from"],
            SectionEnd::MarkCompleteAndReset,
        ),
    ]
}

const RSX_DRIVER_INFO_LEGACY: &str = r"RSX:(\d|\.|\s|\w|-)* (?<driver_version>(\d+\.)*\d+)\r?\n[^\n]*?RSX: [^\n]+\r?\n[^\n]*?RSX: (?<driver_manuf>.*?)\r?\n[^\n]*?RSX: Supported texel buffer size";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        let expected = [24, 30, 1, 33, 11, 1, 65];
        let counts: Vec<usize> = SECTIONS.iter().map(|s| s.extractors.len()).collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn end_triggers_are_case_insensitive() {
        assert!(SECTIONS[0].is_end("·! 0:00:01.000 used configuration:"));
        assert!(SECTIONS[6].is_end("S 0:10:00 SYS: stopping emulator..."));
        assert!(!SECTIONS[1].is_end("PPU Decoder: Recompiler (LLVM)"));
    }

    #[test]
    fn storage_key_strips_alias_suffix() {
        assert_eq!(storage_key("failed_to_decrypt__self"), "failed_to_decrypt");
        assert_eq!(storage_key("serial"), "serial");
    }

    #[test]
    fn fs_stat_guard_drops_benign_error_code() {
        let ex = SECTIONS[6]
            .extractors
            .iter()
            .find(|e| e.trigger == "'sys_fs_stat' failed")
            .unwrap();
        let benign = "E sys_fs: 'sys_fs_stat' failed with 0x8001002c : ENOENT, “/dev_bdvd/PS3_GAME/USRDIR/a.dat”";
        let caps = ex.regex.captures(benign).unwrap();
        assert!(!ex.accepts(&caps));
        let broken = "E sys_fs: 'sys_fs_stat' failed with 0x80010006 : ENOENT, “/dev_bdvd/PS3_GAME/USRDIR/a.dat”";
        let caps = ex.regex.captures(broken).unwrap();
        assert!(ex.accepts(&caps));
        assert_eq!(&caps["broken_filename_or_dir"], "PS3_GAME/USRDIR/a.dat");
    }

    #[test]
    fn null_pad_is_ignored() {
        let ex = SECTIONS[6]
            .extractors
            .iter()
            .find(|e| e.trigger == "Input: Pad")
            .unwrap();
        let line = "Input: Pad 0: device='Null', handler=Null, VID=0x0, PID=0x0";
        let caps = ex.regex.captures(line).unwrap();
        assert!(!ex.accepts(&caps));
    }
}
