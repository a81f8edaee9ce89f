use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use log_doctor::amd::{AmdTableError, AmdTableProvider, AmdTableSource};
use log_doctor::config::Config;
use log_doctor::models::{ExtractionModel, ParseOutcome, RawAttachment};
use log_doctor::normalize::normalize;
use log_doctor::pipeline::{Diagnosis, LogPipeline};
use log_doctor::rules::{check_integrity, EnrichmentSources, TitleManifestSource};
use log_doctor::similarity::group_similar;

struct Offline;

#[async_trait]
impl AmdTableSource for Offline {
    async fn fetch(&self) -> Result<Vec<u8>, AmdTableError> {
        Err(AmdTableError::Status(404))
    }
}

struct Manifest(Vec<String>);

#[async_trait]
impl TitleManifestSource for Manifest {
    async fn file_names(&self, _serial: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

fn offline_pipeline(config: &Config, sources: EnrichmentSources) -> LogPipeline {
    let amd = AmdTableProvider::new(Box::new(Offline), Duration::from_secs(3600));
    LogPipeline::new(config, Arc::new(amd), sources)
}

fn sample_log(renderer: &str) -> String {
    format!(
        "RPCS3 v0.0.32-16500-abcdef12 Alpha | master\n\
         · 0:00:00.000001 SYS: Title: Demon's Souls\n\
         · 0:00:00.000002 SYS: Serial: BLUS30443\n\
         · 0:00:00.000003 SYS: Category: DG\n\
         Used configuration:\n\
         Core:\n  PPU Decoder: Recompiler (LLVM)\n  SPU Decoder: Recompiler (LLVM)\n\
         VFS:\n  Enable /host_root/: false\n\
         Video:\n  Renderer: {}\n  Resolution: 1280x720\n\
         Audio:\n  Renderer: Cubeb\n\
         Log:\n  Log level: Notice\n\
         ·\n",
        renderer
    )
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn zip(entry: &str, bytes: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(entry, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(bytes).unwrap();
    writer.finish().unwrap().into_inner()
}

fn settings(diagnosis: &Diagnosis) -> Vec<String> {
    diagnosis
        .sections
        .iter()
        .find(|s| s.name == "Important Settings to Review")
        .map(|s| s.lines.clone())
        .unwrap_or_default()
}

#[tokio::test]
async fn archives_and_plain_text_agree() {
    let pipeline = offline_pipeline(&Config::default(), EnrichmentSources::none());
    let log = sample_log("D3D12");

    let plain = pipeline
        .run(RawAttachment::new("RPCS3.log", log.as_bytes().to_vec()))
        .await
        .unwrap();
    let gz = pipeline
        .run(RawAttachment::new("RPCS3.log.gz", gzip(log.as_bytes())))
        .await
        .unwrap();
    let zipped = pipeline
        .run(RawAttachment::new("logs.zip", zip("RPCS3.log", log.as_bytes())))
        .await
        .unwrap();

    for diagnosis in [&plain, &gz, &zipped] {
        assert_eq!(diagnosis.outcome, ParseOutcome::Success);
        assert_eq!(diagnosis.model.get("serial"), Some("BLUS30443"));
        assert_eq!(diagnosis.model.get("renderer"), Some("D3D12"));
    }
    assert_eq!(plain.sections, gz.sections);
    assert_eq!(plain.notes, zipped.notes);
    assert!(settings(&plain).contains(&"💢 Do not use DX12 renderer".to_string()));
}

#[tokio::test]
async fn vulkan_log_has_no_dx12_annotation() {
    let pipeline = offline_pipeline(&Config::default(), EnrichmentSources::none());
    let diagnosis = pipeline
        .run(RawAttachment::new("RPCS3.log", sample_log("Vulkan").into_bytes()))
        .await
        .unwrap();
    assert!(!settings(&diagnosis).iter().any(|l| l.contains("DX12")));
}

#[tokio::test]
async fn zip_without_log_is_rejected() {
    let pipeline = offline_pipeline(&Config::default(), EnrichmentSources::none());
    let err = pipeline
        .run(RawAttachment::new("shots.zip", zip("screenshot.png", &[0u8; 256])))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("doesn't contain any logs"));
}

#[tokio::test]
async fn size_limit_keeps_partial_model() {
    let mut config = Config::default();
    config.limits.log_size_limit = 200;
    let pipeline = offline_pipeline(&config, EnrichmentSources::none());
    let mut log = sample_log("Vulkan");
    log.push_str(&"· 0:00:01.000000 E RSX: filler line\n".repeat(100));

    let diagnosis = pipeline
        .run(RawAttachment::new("RPCS3.log", log.into_bytes()))
        .await
        .unwrap();
    assert_eq!(diagnosis.outcome, ParseOutcome::SizeLimitReached);
    assert!(!diagnosis.model.model.is_empty());
    assert_eq!(diagnosis.model.get("serial"), Some("BLUS30443"));
}

#[tokio::test]
async fn missing_files_listed_in_manifest_confirm_corruption() {
    let mut raw = ExtractionModel::default();
    raw.set("serial", "BLUS30443");
    raw.push_multi("broken_filename", "PS3_GAME/USRDIR/data/level1.bin");
    let model = normalize(&raw, &Default::default());

    let manifest = vec!["PS3_GAME/USRDIR/data/level1.bin".to_string()];
    assert!(check_integrity(&model, Some(manifest.as_slice())).broken);

    let unrelated = vec!["PS3_GAME/USRDIR/data/level2.bin".to_string()];
    let report = check_integrity(&model, Some(unrelated.as_slice()));
    assert!(report.checked);
    assert!(!report.broken);

    let sources = EnrichmentSources {
        manifest: Some(Box::new(Manifest(manifest))),
        ..EnrichmentSources::none()
    };
    let enrichment = sources.gather(&model).await;
    assert_eq!(enrichment.manifest.as_deref().map(<[String]>::len), Some(1));
}

#[test]
fn similar_fatal_errors_cluster() {
    let texts = vec![
        "SPU Worker 1 crashed".to_string(),
        "SPU Worker 2 crashed".to_string(),
        "totally unrelated error".to_string(),
    ];
    let clusters = group_similar(&texts, 0.75);
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters.iter().filter(|c| c.count == 2).count(), 1);
}
