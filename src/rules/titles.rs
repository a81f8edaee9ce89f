//! Per-title settings checks.
//!
//! Each [`TitleGroup`] pairs a set of serials with a check that appends to the
//! settings list or the general notes. Groups run in table order, after the
//! generic settings rules and before the system-software checks.

use super::{Findings, RuleInput};
use crate::version::Version;

/// Persona 5.
pub(super) const P5_IDS: &[&str] = &[
    "BLES02247", "BLUS31604", "BLJM61346",
    "NPEB02436", "NPUB31848", "NPJB00769",
];

/// Demon's Souls, including the PSN re-releases and the trade demo.
pub(super) const DES_IDS: &[&str] = &[
    "BLES00932", "BLUS30443", "BCJS30022", "BCAS20071",
    "NPEB01202", "NPUB30910", "NPJA00102",
    "BLUD80018",
];

/// God of War HD collection, which runs better on OpenGL.
pub(super) const GOW_HD_IDS: &[&str] = &[
    "BCAS20102", "BCES00791", "BCES00800", "BLJM60200", "BCUS98229",
    "NPUA80491", "NPUA80490", "NPEA00255", "NPEA00256", "NPJA00062", "NPJA00061", "NPJA00066",
];

const P5_HASHES: &[&str] = &[
    "e72e715d646a94770d1902364bc66fe33b1b6606",
    "b8c34f774adb367761706a7f685d4f8d9d355426",
    "3b394da7912181d308bf08505009b3578521c756",
    "9da9b988693598fbe1e2d316d1e927c37ad666bc",
];

const ASURA_IDS: &[&str] = &["BLES01227", "BLUS30721"];

const JOJO_IDS: &[&str] = &[
    "BLES01986", "BLUS31405", "BLJS10217",
    "NPEB01922", "NPUB31391", "NPJB00331",
    "BLJS10318", "NPJB00753",
];

const JOJO_HASHES: &[&str] = &[
    "6875682ab309df32307c5305c43bb132c4e261fa",
    "18cf9a4e8196684ed9ee816f82649561fd1bf182",
];

const SIMPSONS_IDS: &[&str] = &["BLES00142", "BLUS30065"];
const SIMPSONS_FIXED: Version = Version::full(0, 0, 29, 15470);

const NIER_IDS: &[&str] = &["BLUS30481", "BLES00826", "BLJM60223"];

const NIER_HASHES: &[&str] = &[
    "13950b2e29e05a115fe317815d3da9d2b2baee65",
    "f098ee8410599c81c89f90d698340a078dc69a90",
];

const DOD3_IDS: &[&str] = &[
    "BLUS31197", "NPUB31251",
    "NPEB01407",
    "BLJM61043", "NPJB00380",
    "BCAS20311", "NPHB00633", "NPHB00639",
];

const DOD3_HASHES: &[&str] = &[
    "2b393f064786e5895d5a576621deb4c9107a8f0b",
    "f2f7f7ea0444353884bb715152147c3a29f4e790",
    "b18834a8f21cd29a091b287a66656a279ccba507",
    "9c04f427625a0064282432e4edfefe9e0956c303",
    "e1a44e5d3fb03a37f0445e92ed13abce8d6efdd4",
    "a017576369165f3746730724c8ae762ed9bc64d8",
    "eda0339b931f6fe15420b053703ddd89b27d615b",
    "62eb0f5d8f0f929cb23309311b89ce21eaa3bc9e",
    "384a28c62ff179a4ae815ab7b711e76fbb1167b4",
    "c09c496514f6dc591434575b04eb7c003826c11d",
    "56cc988f7d5b5127049f28ed9278b98de2e4ff1f",
    "ac64494f4ea31f8b0f82584c48916d30dad16300",
    "20183817f17fb358d28131e195c5af1fc9579ada",
    "def0c4b28e5c35da73fcc07731ec0cc3d7fe9485",
    "8342766aab0791f480d0a6f8984cc5c199455c64",
];

const SCOTT_PILGRIM_IDS: &[&str] = &["NPEB00258", "NPUB30162", "NPJB00068"];

const GOW3_IDS: &[&str] = &[
    "BCAS25003", "BCES00510", "BCES00516", "BCES00799", "BCJS37001", "BCUS98111", "BCKS15003",
];

const GOW_ASCENSION_IDS: &[&str] = &[
    "BCAS25016", "BCES01741", "BCES01742", "BCUS98232",
    "NPEA00445", "NPEA90123", "NPUA70216", "NPUA70269", "NPUA80918",
    "NPHA80258",
];

const DES_HASHES: &[&str] = &[
    "83681f6110d33442329073b72b8dc88a2f677172",
    "5446a2645880eefa75f7e374abd6b7818511e2ef",
    "9403fe1678487def5d7f3c380b4c4fb275035378",
    "f965a746d844cd0c572a7e8731b5b3b7a81f7bdd",
];

const TLOU_IDS: &[&str] = &[
    "BCAS20270", "BCES01584", "BCES01585", "BCJS37010", "BCUS98174",
    "NPEA00435", "NPJA00096", "NPHA80243", "NPUA80960",
    "NPEA00521", "NPJA00129", "NPHA80279", "NPUA81175", // left behind
    "NPEA90122", "NPHA80246", "NPUA70257", // demos
    "NPEA00454", "NPUA30134", "NPEA00517",
    "NPJM00012",
    "NPUO30130",
];

const TLOU_FIXED_RCB: Version = Version::full(0, 0, 21, 13432);

const KILLZONE3_IDS: &[&str] = &[
    "BCAS20157", "BCAS25008", "BCES01007", "BCJS30066", "BCJS37003", "BCJS70016", "BCJS75002", "BCUS98234",
    "NPEA00321", "NPEA90084", "NPEA90085", "NPEA90086", "NPHA80140", "NPJA90178", "NPUA70133",
];

const RDR_IDS: &[&str] = &[
    "BLAS50296", "BLES00680", "BLES01179", "BLES01294", "BLUS30418", "BLUS30711", "BLUS30758",
    "BLJM60314", "BLJM60403", "BLJM61181", "BLKS20315",
    "NPEB00833", "NPHB00465", "NPHB00466", "NPUB30638", "NPUB30639",
    "NPUB50139",
];

const MGS4_IDS: &[&str] = &[
    "BLAS55005", "BLES00246", "BLJM57001", "BLJM67001", "BLKS25001", "BLUS30109", "BLUS30148",
    "NPEB02182", "NPJB00698", "NPUB31633",
    "NPEB90116", "NPHB00065", "NPHB00067", "NPJB90149", "NPUB90176", // demos
    "NPEB00027", "NPJB90113", "NPUB90126",
];

const MGS4_HASHES: &[&str] = &[
    "6e1a0a58a43ad437488e88e402e9ac16a0b23caa",
    "9712144d93487f0b62e39f55e175af783b58af72",
    "33e09a0bd8fa2a3b28780a3feeb7b0e018bae381",
    "a79a75426fc84a407265f91f8818681c864231b9",
    "c937999ea44fb6260455b85c9f25eea55b1208b9",
    "0d33f5054f70a738799bd5da86d8baa10635f623",
    "7ddd13b8a7e9ff386659bfbccd183dc7f7f701f4",
    "c19b3b57017488d9bd126a4b6cfba3566e0905fb",
    "6886ae8f4270fe3fa4c7cf4299307044ad4ce989",
    "bbf4c85f1c01e182e7f96d34f734772c4430a426",
    "347d16fbdb0a12f1083c0fb98343c4642d4641cb",
    "2b65154021bb8c3b25616324975af795720c5f78",
    "044d68440c37065c5248a3a08a0e6da6082435df",
    "3685929dd4a6e62ff8a61d43871c6b4714a76136",
    "c09e68e24682720027d194ef4f6dd067dc2e0908",
    "07cb711984e305c27108848d5f6579d4dd7f6c47",
    "7efe5774b7325c8346539489b41cb132857af1f7",
    "30bdcdc31c75c737b8e699c0f22516488a7a50c0",
    "158a56cf4bdad65fa6e01a338a25500d6953cd68",
    "fb73182c2590843c6c5bc39c9292d887716006e7",
];

const PROJECT_DIVA_IDS: &[&str] = &[
    "BLJM60527", "BLUS31319", "BLAS50576",
    "NPEB01393", "NPUB31241", "NPHB00559", "NPJB00287",
];

const PROJECT_DIVA_HASHES: &[&str] = &[
    "f3227f57ec001582b253035fd90de77f05ead470",
    "c02e3b52e3d75f52f76fb8f0fb5be7ca4d921949",
    "1105af0a4d6a4a1481930c6f3090c476cde06c4c",
];

const PROJECT_DIVA_2ND_IDS: &[&str] = &[
    "BCAS50693", "BLAS50693", "BLES02029", "BLJM61079",
    "NPUB31488", "NPHB00671", "NPHB00662", "NPEB02013", "NPJB00435",
];

const PROJECT_DIVA_2ND_HASHES: &[&str] = &[
    "092c43e2bcacccfe3cdc22b0ab8062b91d4e1cf9",
    "67e0e7c9b2a7a340c914a0d078e25aac1047e4d4",
    "51d336edfa3774f2db83ed030611f462c097c40b",
    "c70b15d3f6694af74fa329dd4fc25fe28a59e9cc",
    "c3291f5919ca147ac854de10f7436f4ad494233f",
    "058cf39c07fd13f100c1f6dc40a0ead9bf3ad51b",
    "8fc9f26ed77cc9237db0e6348dcf9d6c451b6220",
    "311fcd98af6adc5e64e6a833eb959f43b0976193",
];

const GT5_IDS: &[&str] = &[
    "BCAS20108", "BCAS20151", "BCAS20154", "BCAS20164", "BCAS20229", "BCAS20267",
    "BCES00569",
    "BCJS30001", "BCJS30050", "BCJS30100",
    "BCUS98114", "BCUS98272", "BCUS98394",
    "NPEA90052", "NPHA80080", "NPUA70087", // time trial
    "NPUA70115",
];

const GT6_IDS: &[&str] = &[
    "BCAS20519", "BCAS20520", "BCAS20521", "BCAS25018", "BCAS25019",
    "BCES01893", "BCES01905", "BCJS37016", "BCUS98296", "BCUS99247",
    "NPEA00502", "NPJA00113", "NPUA81049",
];

const SLY4_IDS: &[&str] = &[
    "BCES01284", "BCUS98247", "BCUS99142",
    "NPEA00429", "NPUA80875",
    "NPEA90120", "NPUA70250",
    "NPUA30123",
];

const DRAGONS_CROWN_IDS: &[&str] = &[
    "BCAS20290", "BCAS20298", "BLES01950", "BLJM61041", "BLUS30767",
    "NPEB01836", "NPUB31235",
];

/// Only the first game has a version-specific note.
const LBP1_IDS: &[&str] = &[
    "BCAS20058", "BCAS20078", "BCAS20091", "BCES00611", "BCES00141", "BCJS70009", "BCKS10059", "BCUS98148",
    "BCUS98199", "BCUS98208",
    "NPEA00241", "NPHA80093", "NPUA80472", "NPUA80479",
];

const INTERESTING_VERSION: &str = "🤔 Very interesting version of the game you got there";
const FPS_UNLOCK_AVAILABLE: &str = "ℹ️ This game has an FPS unlock patch";
const NOT_UNLOCKED: &str = "ℹ️ `VBlank Rate` is not set; FPS is limited to 30";
const NEW_VARIABLE_PATCH: &str = "⚠️ There is a new variable frame rate FPS patch available";

/// A named set of serials with its settings check.
#[derive(Clone)]
pub struct TitleGroup {
    pub name: &'static str,
    pub ids: &'static [&'static str],
    pub(crate) check: fn(&RuleInput<'_>, &mut Findings),
}

impl std::fmt::Debug for TitleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleGroup")
            .field("name", &self.name)
            .field("ids", &self.ids.len())
            .finish()
    }
}

impl TitleGroup {
    pub fn matches(&self, serial: &str) -> bool {
        self.ids.contains(&serial)
    }
}

pub fn builtin_groups() -> Vec<TitleGroup> {
    let group = |name, ids, check| TitleGroup { name, ids, check };
    vec![
        group("Persona 5", P5_IDS, persona5),
        group("Asura's Wrath", ASURA_IDS, asuras_wrath),
        group("JoJo's Bizarre Adventure: All Star Battle", JOJO_IDS, jojo),
        group("The Simpsons Game", SIMPSONS_IDS, simpsons),
        group("NieR", NIER_IDS, nier),
        group("Drakengard 3", DOD3_IDS, drakengard3),
        group("Scott Pilgrim vs. the World", SCOTT_PILGRIM_IDS, scott_pilgrim),
        group("God of War III", GOW3_IDS, god_of_war),
        group("God of War: Ascension", GOW_ASCENSION_IDS, god_of_war),
        group("Demon's Souls", DES_IDS, demons_souls),
        group("The Last of Us", TLOU_IDS, last_of_us),
        group("Red Dead Redemption", RDR_IDS, red_dead),
        group("Metal Gear Solid 4", MGS4_IDS, mgs4),
        group("Hatsune Miku: Project DIVA F", PROJECT_DIVA_IDS, project_diva),
        group("Hatsune Miku: Project DIVA F 2nd", PROJECT_DIVA_2ND_IDS, project_diva),
        group("Gran Turismo 5", GT5_IDS, gran_turismo5),
        group("Gran Turismo 6", GT6_IDS, gran_turismo6),
        group("Sly Cooper: Thieves in Time", SLY4_IDS, sly4),
        group("Dragon's Crown", DRAGONS_CROWN_IDS, dragons_crown),
        group("LittleBigPlanet", LBP1_IDS, little_big_planet),
        group("Killzone 3", KILLZONE3_IDS, killzone3),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

fn any_hash(input: &RuleInput<'_>, hashes: &[&str]) -> bool {
    hashes.iter().any(|h| input.ppu.contains_ignore_case(h))
}

fn has_tsx(input: &RuleInput<'_>) -> bool {
    input
        .get("cpu_extensions")
        .is_some_and(|e| e.contains("TSX"))
}

/// Set and not equal to `expected`.
fn differs(input: &RuleInput<'_>, key: &str, expected: &str) -> bool {
    input.get(key).is_some_and(|v| v != expected)
}

fn max_applied(input: &RuleInput<'_>) -> Option<u32> {
    input.ppu.applied().iter().map(|(_, c)| c).max()
}

fn game_version(input: &RuleInput<'_>) -> Option<Version> {
    input.version("game_version")
}

// ═══════════════════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════════════════

fn persona5(input: &RuleInput<'_>, findings: &mut Findings) {
    let settings = &mut findings.settings;
    if input.get("ppu_decoder").is_some_and(|d| !d.contains("LLVM")) {
        settings.push("⚠️ Please set `PPU Decoder` to `Recompiler (LLVM)`");
    }
    if let Some(spu) = input.get("spu_decoder") {
        if spu.contains("Interpreter") {
            settings.push("⚠️ Please set `SPU Decoder` to `Recompiler (LLVM)`");
        } else if spu.contains("ASMJIT") {
            settings.push("ℹ️ Please consider setting `SPU Decoder` to `Recompiler (LLVM)`");
        }
    }

    if let Some(threads) = input.get("spu_threads") {
        if has_tsx(input) {
            if threads != "Auto" {
                settings.push("ℹ️ `SPU Thread Count` is best to set to `Auto`");
            }
        } else if threads != "2" {
            match input.thread_count {
                Some(count) if count <= 4 => {
                    if threads != "1" {
                        settings.push("ℹ️ `SPU Thread Count` is best to set to `2` or `1`");
                    }
                }
                _ => settings.push("ℹ️ `SPU Thread Count` is best to set to `2`"),
            }
        }
    }
    if input.on("spu_loop_detection") {
        settings.push("ℹ️ If you have distorted audio, try disabling `SPU Loop Detection`");
    }
    if differs(input, "frame_limit", "Off") {
        settings.push("⚠️ `Frame Limiter` is not required, please disable");
    }
    if input.on("write_color_buffers") {
        settings.push("⚠️ `Write Color Buffers` is not required, please disable");
    }
    if input.on("cpu_blit") {
        settings.push("⚠️ `Force CPU Blit` is not required, please disable");
    }
    if input.on("strict_rendering_mode") {
        settings.push("⚠️ `Strict Rendering Mode` is not required, please disable");
    }
    let applied = input.ppu.applied();
    if applied.is_empty() && input.int("resolution_scale").is_some_and(|s| s > 100) {
        settings.push("⚠️ `Resolution Scale` over 100% requires portrait sprites mod");
    }
    // v1 of the 60 fps patch touches 12 spots, v2 268
    if input.patch_names.iter().any(|n| n.contains("60")) || applied.iter().any(|(_, c)| c > 260) {
        settings.push("ℹ️ 60 fps patch is enabled; please disable if you have any strange issues");
    }
    if !any_hash(input, P5_HASHES) {
        findings.notes.push(INTERESTING_VERSION);
    }
}

fn asuras_wrath(input: &RuleInput<'_>, findings: &mut Findings) {
    let upscaled = input.int("resolution_scale").is_some_and(|s| s > 100);
    if upscaled && input.int("texture_scale_threshold").is_some_and(|t| t < 500) {
        findings.settings.push(
            "⚠️ `Resolution Scale` over 100% requires `Resolution Scale Threshold` set to `512x512`",
        );
    }
    if differs(input, "af_override", "Auto") {
        findings
            .settings
            .push("⚠️ Please use `Auto` for `Anisotropic Filter Override`");
    }
}

fn jojo(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.on("audio_buffering") && input.get("audio_buffer_duration") != Some("20") {
        findings
            .settings
            .push("ℹ️ If you experience audio issues, set `Audio Buffer Duration` to `20ms`");
    } else if input.off("audio_buffering") {
        findings.settings.push(
            "ℹ️ If you experience audio issues, check `Enable Buffering` and set `Audio Buffer Duration` to `20ms`",
        );
    }

    if matches!(input.serial, "BLUS31405" | "BLJS10318") {
        if let Some(vblank) = input.int("vblank_rate") {
            if !input.ppu.applied().is_empty() {
                match vblank {
                    60 => findings.settings.push(NOT_UNLOCKED),
                    120 => findings
                        .settings
                        .push("✅ Settings are set for the 60 FPS patch"),
                    other => findings.settings.push(format!(
                        "⚠️ Settings are configured for the {} FPS patch, which is unsupported",
                        other / 2
                    )),
                }
            } else {
                if vblank > 60 {
                    findings
                        .settings
                        .push("ℹ️ Unlocking FPS requires game patch");
                }
                if any_hash(input, JOJO_HASHES) {
                    findings.notes.push(FPS_UNLOCK_AVAILABLE);
                }
            }
        }
    }

    if input.serial == "BLUS31405"
        && input
            .get("compat_database_path")
            .is_some_and(|p| p.contains("JoJo ASB Emulator v.04"))
        && !input.multi("rap_file").is_empty()
    {
        findings.notes.push(INTERESTING_VERSION);
    }
}

fn simpsons(input: &RuleInput<'_>, findings: &mut Findings) {
    let patched = !input.ppu.applied().is_empty() && input.has_patch_name("Fix pad initialization");
    let fixed = matches!(input.build, Some(v) if v >= SIMPSONS_FIXED);
    if !fixed && !patched {
        findings.notes.push(
            "ℹ️ This game has a controller initialization bug. Please use [the patch](https://wiki.rpcs3.net/index.php?title=The_Simpsons_Game#Patches).",
        );
    }
}

fn nier(input: &RuleInput<'_>, findings: &mut Findings) {
    let frame_limit = input.get("frame_limit");
    let vsync = input.on("vsync");
    let settings = &mut findings.settings;
    match max_applied(input) {
        Some(max) if max > 1 => settings.push("✅ Using the variable rate FPS patch"),
        Some(_) => {
            match frame_limit {
                Some("Off") => {
                    if !vsync {
                        settings.push("⚠️ Please set `Framerate Limiter` to `Auto` or enable V-Sync");
                    }
                }
                Some("59.95") | Some("60") | Some("Auto") => {
                    if vsync {
                        settings.push("⚠️ Please set `Framerate Limiter` to `Off`");
                    }
                }
                _ => {
                    if vsync {
                        settings.push("⚠️ Please set `Framerate Limiter` to `Off`");
                    } else {
                        settings.push("⚠️ Please set `Framerate Limiter` to `Auto` or enable V-Sync");
                    }
                }
            }
            settings.push(NEW_VARIABLE_PATCH);
        }
        None => {
            if frame_limit != Some("30") {
                settings.push("⚠️ Please set `Framerate Limiter` to 30 fps");
            }
            if any_hash(input, NIER_HASHES) {
                findings.notes.push(FPS_UNLOCK_AVAILABLE);
            }
        }
    }

    if input.serial == "BLJM60223" && input.on("native_ui") {
        findings
            .settings
            .push("ℹ️ To enter the character name, disable `Native UI` and use Japanese text");
    }
    if input
        .get("sleep_timer")
        .is_some_and(|t| t != "Usleep Only" && t != "Usleep")
    {
        findings
            .settings
            .push("⚠️ Please set `Sleep Timers Accuracy` setting to `Usleep Only`");
    }
}

fn drakengard3(input: &RuleInput<'_>, findings: &mut Findings) {
    let Some(vblank) = input.int("vblank_rate") else {
        return;
    };
    if !input.ppu.applied().is_empty() {
        let line = match vblank {
            60 => NOT_UNLOCKED.to_string(),
            120 | 240 => format!("✅ Settings are set for the {} FPS patch", vblank / 2),
            v if v > 240 => format!(
                "⚠️ Settings are configured for the {} FPS patch, which is too high; issues are expected",
                v / 2
            ),
            v => format!("ℹ️ Settings are set for the {} FPS patch", v / 2),
        };
        findings.settings.push(line);
    } else {
        if vblank > 60 {
            findings
                .settings
                .push("ℹ️ Unlocking FPS requires game patch");
        }
        if any_hash(input, DOD3_HASHES) {
            findings.notes.push(FPS_UNLOCK_AVAILABLE);
        } else if !input.ppu.is_empty() {
            findings.notes.push(INTERESTING_VERSION);
        }
    }
}

fn scott_pilgrim(input: &RuleInput<'_>, findings: &mut Findings) {
    if differs(input, "resolution", "1920x1080") {
        findings
            .settings
            .push("⚠️ For perfect sprite scaling without borders set `Resolution` to `1920x1080`");
    }
    if game_version(input).is_some_and(|v| v < Version::new(1, 3)) {
        findings
            .notes
            .push("⚠️ Please update game to v1.03 if you experience visual issues");
    }
}

fn god_of_war(input: &RuleInput<'_>, findings: &mut Findings) {
    if GOW3_IDS.contains(&input.serial) {
        findings
            .notes
            .push("ℹ️ Black screen after Santa Monica logo is fine for up to 5 minutes");
    } else if GOW_ASCENSION_IDS.contains(&input.serial) {
        findings
            .notes
            .push("ℹ️ This game is known to be very unstable");
    }
}

fn demons_souls(input: &RuleInput<'_>, findings: &mut Findings) {
    let settings = &mut findings.settings;
    if differs(input, "spu_block_size", "Safe") {
        settings.push("ℹ️ Please set `SPU Block Size` to `Safe` to reduce crash rate");
    }
    if differs(input, "frame_limit", "Off") {
        settings.push("⚠️ `Frame Limiter` should be `Off`");
    }
    if input.on("spu_loop_detection") {
        settings.push("⚠️ `SPU Loop Detection` is `Enabled`, and can cause visual artifacts");
    }
    if differs(input, "spu_threads", "Auto") {
        settings.push("⚠️ Please set `SPU Thread Count` to `Auto` for best performance");
    }
    if !matches!(input.serial, "BLES00932" | "BLUS30443") {
        return;
    }

    let applied = input.ppu.applied();
    match (input.int("vblank_rate"), input.int("clock_scale")) {
        (Some(vblank), Some(clock)) => {
            let vblank_ratio = vblank as f64 / 60.0;
            let clock_ratio = clock as f64 / 100.0;
            if applied.iter().any(|(_, c)| c >= 25) {
                if vblank != 60 {
                    settings.push(format!(
                        "ℹ️ `VBlank Rate` is set to {} Hz ({:.0}%)",
                        vblank,
                        vblank_ratio * 100.0
                    ));
                }
                if clock != 100 {
                    settings.push(format!(
                        "⚠️ `Clock Scale` is set to {}%, please set it back to 100%",
                        clock
                    ));
                } else {
                    settings.push("✅ Settings are set for the variable rate FPS patch");
                }
            } else if !applied.is_empty() {
                if vblank == 60 {
                    settings.push(NOT_UNLOCKED);
                }
                if (vblank_ratio - clock_ratio).abs() > 0.05 {
                    settings.push(format!(
                        "⚠️ `VBlank Rate` is set to {} Hz ({:.0}%), but `Clock Scale` is set to {}%",
                        vblank,
                        vblank_ratio * 100.0,
                        clock
                    ));
                } else if vblank == 60 {
                    settings.push("ℹ️ Settings are not set for the fixed rate FPS patch");
                } else {
                    settings.push(format!(
                        "✅ Settings are set for the fixed rate {} FPS patch",
                        vblank / 2
                    ));
                }
                settings.push(NEW_VARIABLE_PATCH);
            } else if any_hash(input, DES_HASHES) {
                findings.notes.push(FPS_UNLOCK_AVAILABLE);
            }
        }
        _ => {
            if !applied.is_empty() {
                settings.push("ℹ️ `VBlank Rate` or `Clock Scale` is not set");
            }
        }
    }
}

fn last_of_us(input: &RuleInput<'_>, findings: &mut Findings) {
    let settings = &mut findings.settings;
    if differs(input, "spu_block_size", "Safe") {
        settings.push("ℹ️ Please set `SPU Block Size` to `Safe` to reduce crash rate");
    }
    if input.on("cpu_blit") {
        settings.push("⚠️ Please disable `Force CPU Blit`");
    }
    if input.off("read_color_buffers") {
        settings.push("⚠️ Please enable `Read Color Buffers`");
    }
    let patched = !input.ppu.applied().is_empty();
    let depth_patches = patched
        && input
            .patch_names
            .iter()
            .filter(|n| n.to_lowercase().contains("depth buffer"))
            .count()
            > 1;
    if input.build_before(TLOU_FIXED_RCB) {
        if input.on("read_depth_buffer") {
            if depth_patches {
                settings.push("⚠️ `Read Depth Buffer` is not required with applied patches");
            }
        } else if !depth_patches {
            settings.push("⚠️ Please enable `Read Depth Buffer` or appropriate patches");
        }
    } else if input.on("read_depth_buffer") {
        settings.push("⚠️ `Read Depth Buffer` is not required");
    }

    if patched && input.has_patch_name("MLAA") {
        if input.on("write_color_buffers") {
            settings.push("⚠️ `Write Color Buffers` is not required with applied MLAA patch");
        }
    } else if input.off("write_color_buffers") {
        settings.push("⚠️ Please enable MLAA patch (Recommended) or `Write Color Buffers`");
    }

    if input.int("resolution_scale").is_some_and(|s| s > 100) && !input.on("strict_rendering_mode") {
        if !input.patch_names.iter().any(|n| n.contains("MLAA")) {
            settings.push("⚠️ Please set `Resolution Scale` to 100% or enable MLAA patch");
        }
        if input.int("texture_scale_threshold").is_some_and(|t| t > 1) {
            settings.push("⚠️ Please set `Resolution Scale Threshold` to 1x1");
        }
    }
}

fn red_dead(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.off("write_color_buffers") {
        findings
            .settings
            .push("ℹ️ `Write Color Buffers` is required for proper visuals at night");
    }
}

fn mgs4(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("build_branch") == Some("mgs4") {
        findings
            .notes
            .push("⚠️ Custom RPCS3 builds are not officially supported");
        findings
            .notes
            .push("⚠️ This custom build comes with pre-configured settings, don't change anything");
    }
    if any_hash(input, MGS4_HASHES) {
        findings.notes.push(FPS_UNLOCK_AVAILABLE);
    } else if !input.ppu.is_empty() {
        findings.notes.push(INTERESTING_VERSION);
    }
}

fn project_diva(input: &RuleInput<'_>, findings: &mut Findings) {
    let second = any_hash(input, PROJECT_DIVA_2ND_HASHES);
    if input.ppu.applied().is_empty() && (any_hash(input, PROJECT_DIVA_HASHES) || second) {
        findings.notes.push(FPS_UNLOCK_AVAILABLE);
    }
    if differs(input, "frame_limit", "Off") {
        findings
            .settings
            .push("⚠️ `Frame Limiter` should be `Off`");
    }
    if !second {
        findings.notes.push(INTERESTING_VERSION);
    }
}

fn gran_turismo5(input: &RuleInput<'_>, findings: &mut Findings) {
    if game_version(input).is_some_and(|v| v > Version::new(1, 5) && v < Version::new(1, 10)) {
        findings
            .notes
            .push("ℹ️ Game versions between 1.05 and 1.10 can fail to boot with HDD space error");
    }
}

fn gran_turismo6(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.on("spu_loop_detection") {
        findings
            .settings
            .push("⚠️ Please disable `SPU Loop Detection` for this game");
    }
    const NEEDS_MORE: &str = "⚠️ Game version newer than v1.05 require additional settings to be enabled";
    let Some(version) = game_version(input) else {
        findings.notes.push(NEEDS_MORE);
        return;
    };

    let mut changed = false;
    let mut flag = |line: &'static str, findings: &mut Findings| {
        findings.settings.push(line);
        changed = true;
    };
    if version > Version::new(1, 5) {
        if input.on("write_color_buffers") {
            flag("⚠️ `Write Color Buffers` is enabled, and can cause screen flicker", findings);
        }
        if input.off("read_color_buffer") {
            flag("⚠️ Please enable `Read Color Buffer`", findings);
        }
        if input.off("read_depth_buffer") {
            flag("⚠️ Please enable `Read Depth Buffer`", findings);
        }
        if changed {
            findings.notes.push(NEEDS_MORE);
        }
    } else {
        for (key, line) in [
            ("write_color_buffers", "⚠️ `Write Color Buffers` is not required"),
            ("read_color_buffer", "⚠️ `Read Color Buffer` is not required"),
            ("write_depth_buffers", "⚠️ `Write Depth Buffers` is not required"),
            ("read_depth_buffer", "⚠️ `Read Depth Buffer` is not required"),
        ] {
            if input.on(key) {
                flag(line, findings);
            }
        }
        if changed {
            findings
                .notes
                .push("⚠️ Game versions up to v1.05 do not require advanced settings");
        }
    }
}

fn sly4(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.int("resolution_scale").is_some_and(|s| s > 100) && input.off("cpu_blit") {
        findings
            .settings
            .push("⚠️ Proper resolution scaling requires `Force CPU Blit` to be `Enabled`");
    }
}

fn dragons_crown(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.on("spu_loop_detection") {
        findings
            .settings
            .push("⚠️ Please disable `SPU Loop Detection` for this game");
    }
}

fn little_big_planet(input: &RuleInput<'_>, findings: &mut Findings) {
    if game_version(input).is_some_and(|v| v < Version::new(1, 24)) {
        findings
            .notes
            .push("⚠️ Please update the game to prevent hang on boot");
    }
}

fn killzone3(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.has_patch_name("MLAA") {
        if input.on("write_color_buffers") {
            findings
                .settings
                .push("⚠️ `Write Color Buffers` is not required with applied MLAA patch");
        }
    } else if input.off("write_color_buffers") {
        findings
            .settings
            .push("⚠️ Please enable MLAA patch (recommended) or `Write Color Buffers`");
    }
}

/// The system menu booted on its own.
pub(super) fn system_menu(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("write_color_buffers").is_some() && !input.on("write_color_buffers") {
        findings
            .settings
            .push("ℹ️ `Write Color Buffers` should be enabled for proper visuals");
    }
    if input.get("cpu_blit").is_some() && !input.on("cpu_blit") {
        findings
            .settings
            .push("ℹ️ `Force CPU Blit` should be enabled for proper visuals");
    }
}

pub(super) fn ps1_classics(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("spu_decoder").is_some_and(|d| !d.contains("ASMJIT")) {
        findings
            .settings
            .push("⚠️ Please set `SPU Decoder` to use `Recompiler (ASMJIT)`");
    }
    if input.on("cpu_blit") {
        findings
            .settings
            .push("ℹ️ Please disable `Force CPU Blit` for PS1 Classics");
    }
    findings.notes.push(
        "ℹ️ PS1 Classics compatibility is subject to [official Sony emulator accuracy](https://www.psdevwiki.com/ps3/PS1_Classics_Emulator_Compatibility_List)",
    );
}
