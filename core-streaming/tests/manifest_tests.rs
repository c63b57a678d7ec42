//! Manifest rewriting against a fake catalog

mod common;

use common::FakeCatalog;
use core_streaming::cache::{CacheConfig, UrlCache};
use core_streaming::manifest::{validate_manifest, ManifestGenerator, ManifestStatus};
use core_streaming::StreamConfig;
use std::sync::Arc;

fn catalog() -> Arc<FakeCatalog> {
    FakeCatalog::new()
        .with_asset("group1", "720p/prog_index.m3u8", "https://cdn.example/abc")
        .with_asset("group1", "1080p/prog_index.m3u8", "https://cdn.example/def")
        .with_asset("group1", "init.mp4", "https://cdn.example/init")
        .with_asset("group1", "audio/en.m3u8", "https://cdn.example/audio-en")
        .with_asset("group1", "audio/fr.m3u8", "https://cdn.example/audio-fr")
        .with_asset("group1", "720p/seg_0.ts", "https://cdn.example/seg0")
        .with_asset("group1", "720p/seg_1.ts", "https://cdn.example/seg1")
}

fn generator(catalog: Arc<FakeCatalog>) -> ManifestGenerator {
    let cache = UrlCache::new(catalog, CacheConfig::default());
    ManifestGenerator::new(cache, StreamConfig::default())
}

#[tokio::test]
async fn test_bare_reference_line() {
    let generator = generator(catalog());

    let output = generator
        .generate("cloudkit://group1/720p/prog_index.m3u8", "group1")
        .await;

    assert_eq!(output, "https://cdn.example/abc");
}

#[tokio::test]
async fn test_map_tag_keeps_other_attributes() {
    let generator = generator(catalog());

    let output = generator
        .generate(
            r#"#EXT-X-MAP:URI="cloudkit://group1/init.mp4",BYTERANGE="0-100""#,
            "group1",
        )
        .await;

    assert_eq!(
        output,
        r#"#EXT-X-MAP:URI="https://cdn.example/init",BYTERANGE="0-100""#
    );
}

#[tokio::test]
async fn test_multi_attribute_tag() {
    let generator = generator(catalog());
    let line = concat!(
        r#"#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aud",URI="cloudkit://group1/audio/en.m3u8","#,
        r#"NAME="English",URI="cloudkit://group1/audio/fr.m3u8",X-FALLBACK="https://other.example/a.m3u8""#,
    );

    let output = generator.generate(line, "group1").await;

    assert_eq!(
        output,
        concat!(
            r#"#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aud",URI="https://cdn.example/audio-en","#,
            r#"NAME="English",URI="https://cdn.example/audio-fr",X-FALLBACK="https://other.example/a.m3u8""#,
        )
    );
}

#[tokio::test]
async fn test_master_playlist_preserves_structure() {
    let generator = generator(catalog());
    let input = "#EXTM3U\r\n\
                 #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\r\n\
                 cloudkit://group1/720p/prog_index.m3u8\r\n\
                 #EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1920x1080\r\n\
                 cloudkit://group1/1080p/prog_index.m3u8\r\n";

    let output = generator.generate(input, "group1").await;

    assert_eq!(
        output,
        "#EXTM3U\r\n\
         #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\r\n\
         https://cdn.example/abc\r\n\
         #EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1920x1080\r\n\
         https://cdn.example/def\r\n"
    );
}

#[tokio::test]
async fn test_generate_is_idempotent_on_resolved_content() {
    let generator = generator(catalog());
    let input = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nhttps://cdn.example/seg0\n\n#EXT-X-ENDLIST\n";

    let first = generator.generate(input, "group1").await;
    assert_eq!(first, input);

    let second = generator.generate(&first, "group1").await;
    assert_eq!(second, input);
}

#[tokio::test]
async fn test_unresolved_placeholders_are_reported_and_kept() {
    let catalog = catalog();
    let generator = generator(catalog.clone());
    let input = "#EXTINF:6.0,\n\
                 cloudkit://group1/720p/seg_0.ts\n\
                 #EXTINF:6.0,\n\
                 cloudkit://group1/720p/missing.ts\n\
                 #EXTINF:6.0,\n\
                 cloudkit://group1/720p/missing.ts\n";

    let report = generator.generate_with_report(input, "group1").await;

    assert_eq!(
        report.text,
        "#EXTINF:6.0,\n\
         https://cdn.example/seg0\n\
         #EXTINF:6.0,\n\
         cloudkit://group1/720p/missing.ts\n\
         #EXTINF:6.0,\n\
         cloudkit://group1/720p/missing.ts\n"
    );
    assert_eq!(report.resolved, 1);
    assert_eq!(report.unresolved, vec!["cloudkit://group1/720p/missing.ts"]);
    assert!(!report.is_complete());

    // One resolution per distinct placeholder
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test]
async fn test_malformed_placeholder_left_in_place() {
    let catalog = catalog();
    let generator = generator(catalog.clone());
    let input = r#"#EXT-X-KEY:METHOD=AES-128,URI="cloudkit://no-path""#;

    let report = generator.generate_with_report(input, "group1").await;

    assert_eq!(report.text, input);
    assert_eq!(report.unresolved, vec!["cloudkit://no-path"]);
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn test_bare_line_needs_known_extension() {
    let catalog = catalog();
    let generator = generator(catalog.clone());
    let input = "cloudkit://group1/notes.txt\n";

    assert_eq!(generator.generate(input, "group1").await, input);
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn test_repeated_segment_resolved_once() {
    let catalog = catalog();
    let generator = generator(catalog.clone());
    let input = "cloudkit://group1/720p/seg_1.ts\ncloudkit://group1/720p/seg_1.ts\n";

    let report = generator.generate_with_report(input, "group1").await;

    assert_eq!(report.text, "https://cdn.example/seg1\nhttps://cdn.example/seg1\n");
    assert_eq!(report.resolved, 2);
    assert!(report.is_complete());
    assert_eq!(catalog.calls(), 1);
}

#[tokio::test]
async fn test_prefetched_group_needs_no_backend_calls() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());
    cache.prefetch("group1").await.unwrap();
    let generator = ManifestGenerator::new(cache.clone(), StreamConfig::default());

    let output = generator
        .generate(
            "#EXTINF:6.0,\ncloudkit://group1/720p/seg_0.ts\n#EXTINF:6.0,\ncloudkit://group1/720p/seg_1.ts\n",
            "group1",
        )
        .await;

    assert_eq!(
        output,
        "#EXTINF:6.0,\nhttps://cdn.example/seg0\n#EXTINF:6.0,\nhttps://cdn.example/seg1\n"
    );
    assert_eq!(catalog.calls(), 1);

    cache.clear_all();
}

#[tokio::test]
async fn test_validation_after_rewrite() {
    let generator = generator(catalog());
    let input = "#EXTM3U\ncloudkit://group1/720p/seg_0.ts\ncloudkit://group1/720p/gone.ts\n";

    assert_eq!(validate_manifest(input, "cloudkit"), ManifestStatus::NotConverted);

    let output = generator.generate(input, "group1").await;
    assert_eq!(validate_manifest(&output, "cloudkit"), ManifestStatus::Mixed);
}

#[tokio::test(start_paused = true)]
async fn test_cold_playlist_resolution_is_bounded() {
    let catalog = FakeCatalog::new();
    let mut playlist = String::from("#EXTM3U\n");
    for i in 0..12 {
        catalog.with_asset("cold", &format!("seg_{}.ts", i), &format!("https://cdn.example/s{}", i));
        playlist.push_str(&format!("#EXTINF:6.0,\ncloudkit://cold/seg_{}.ts\n", i));
    }
    catalog.set_delay(std::time::Duration::from_millis(100));

    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());
    let generator = ManifestGenerator::new(
        cache,
        StreamConfig::default().with_max_concurrent_resolutions(3),
    );

    let report = generator.generate_with_report(&playlist, "cold").await;

    assert!(report.is_complete());
    assert_eq!(report.resolved, 12);
    assert_eq!(catalog.calls(), 12);
    assert!(catalog.peak_concurrency() <= 3, "peak {}", catalog.peak_concurrency());
}
