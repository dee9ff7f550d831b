use std::collections::BTreeMap;

use infuse_core::{Image, InjectionChain, InjectionRecord, Registry};
use proptest::prelude::*;
use tempfile::TempDir;

fn record(hash: &str, base_ref: &str) -> InjectionRecord {
    InjectionRecord {
        hash: hash.to_owned(),
        base_ref: Some(base_ref.to_owned()),
    }
}

// ── InjectionChain ──

#[test]
fn empty_labels_give_empty_chain() {
    let chain = InjectionChain::from_labels(&BTreeMap::new());
    assert!(chain.is_empty());
    assert_eq!(chain.next_index(), 0);
}

#[test]
fn chain_reads_contiguous_records() {
    let mut labels = BTreeMap::new();
    labels.insert("com.example.label".to_owned(), "value".to_owned());
    labels.insert("sh.chezmoi.injected.0.hash".to_owned(), "h0".to_owned());
    labels.insert("sh.chezmoi.injected.0.base.ref".to_owned(), "r0".to_owned());
    labels.insert("sh.chezmoi.injected.1.hash".to_owned(), "h1".to_owned());
    labels.insert("sh.chezmoi.injected.1.base.ref".to_owned(), "r1".to_owned());

    let chain = InjectionChain::from_labels(&labels);

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.next_index(), 2);
    assert_eq!(chain.records()[1], record("h1", "r1"));
}

#[test]
fn chain_stops_at_first_gap() {
    let mut labels = BTreeMap::new();
    labels.insert("sh.chezmoi.injected.0.hash".to_owned(), "h0".to_owned());
    labels.insert("sh.chezmoi.injected.2.hash".to_owned(), "h2".to_owned());

    let chain = InjectionChain::from_labels(&labels);

    assert_eq!(chain.len(), 1);
    assert_eq!(chain.records()[0].base_ref, None);
}

#[test]
fn missing_base_ref_is_not_invented() {
    let mut labels = BTreeMap::new();
    labels.insert("sh.chezmoi.injected.0.hash".to_owned(), "h0".to_owned());

    let mut chain = InjectionChain::from_labels(&labels);
    chain.push(record("h1", "busybox:latest-injected.0"));
    chain.apply_to(&mut labels);

    assert!(!labels.contains_key("sh.chezmoi.injected.0.base.ref"));
    assert_eq!(labels["sh.chezmoi.injected.0.hash"], "h0");
    assert_eq!(
        labels["sh.chezmoi.injected.1.base.ref"],
        "busybox:latest-injected.0"
    );
}

#[test]
fn push_appends_and_renders_label_pairs() {
    let mut chain = InjectionChain::default();
    assert_eq!(chain.push(record("h0", "busybox:latest")), 0);
    assert_eq!(chain.push(record("h1", "busybox:latest-injected.0")), 1);

    let mut labels = BTreeMap::new();
    labels.insert("keep".to_owned(), "me".to_owned());
    chain.apply_to(&mut labels);

    assert_eq!(labels.len(), 5);
    assert_eq!(labels["keep"], "me");
    assert_eq!(labels["sh.chezmoi.injected.0.hash"], "h0");
    assert_eq!(
        labels["sh.chezmoi.injected.1.base.ref"],
        "busybox:latest-injected.0"
    );
    assert_eq!(InjectionChain::from_labels(&labels), chain);
}

// ── Image descriptor ──

#[test]
fn image_defaults() {
    let image = Image::new("oci.example.org/busybox:latest");

    assert!(image.tags.is_empty());
    assert!(!image.no_cache);
    assert!(image.settings.build_on_preview);
    assert_eq!(image.settings.network, "default");
    assert!(image.injections().is_empty());
}

#[test]
fn image_descriptor_parses_all_settings() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("image.toml");
    std::fs::write(
        &path,
        r#"
reference = "oci.example.org/busybox:latest@sha256:0000"
tags = ["oci.example.org/busybox:latest"]
no_cache = false
cache_from = ["type=gha"]
cache_to = ["type=gha,mode=max"]
target = "runtime"

[labels]
"com.example.label" = "value"

[settings]
builder = "default"
build_on_preview = true
exec = true
exports = ["type=oci,dest=oci.example.org/busybox:latest"]
load = true
network = "host"
platforms = ["linux/amd64", "linux/arm64"]
pull = true
push = true
ssh = ["default"]

[[settings.registries]]
address = "oci.example.org"
username = "user"
password_env = "REGISTRY_PASSWORD"
"#,
    )
    .unwrap();

    let image = Image::load(&path).unwrap();

    assert_eq!(image.tags, vec!["oci.example.org/busybox:latest"]);
    assert_eq!(image.target.as_deref(), Some("runtime"));
    assert_eq!(image.labels["com.example.label"], "value");
    assert_eq!(image.settings.builder.as_deref(), Some("default"));
    assert!(image.settings.exec);
    assert_eq!(image.settings.network, "host");
    assert_eq!(image.settings.platforms.len(), 2);
    assert_eq!(
        image.settings.registries,
        vec![Registry {
            address: "oci.example.org".to_owned(),
            username: Some("user".to_owned()),
            password_env: Some("REGISTRY_PASSWORD".to_owned()),
        }]
    );
}

#[test]
fn image_descriptor_survives_serialization() {
    let mut image = Image::new("sha256:abcd");
    image.tags.push("oci.example.org/app:1.0-injected.0".to_owned());
    image.settings.platforms.push("linux/amd64".to_owned());
    let mut chain = InjectionChain::default();
    chain.push(record("aGFzaA==", "oci.example.org/app:1.0"));
    chain.apply_to(&mut image.labels);

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("image.toml");
    std::fs::write(&path, image.to_toml().unwrap()).unwrap();

    let loaded = Image::load(&path).unwrap();
    assert_eq!(loaded, image);
    assert_eq!(loaded.injections().len(), 1);
}

#[test]
fn image_load_reports_parse_errors() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("image.toml");
    std::fs::write(&path, "tags = []").unwrap();

    let err = Image::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse image descriptor"));
}

proptest! {
    #[test]
    fn chain_survives_labels(depth in 0usize..32, extra in "[a-z]{1,8}") {
        let mut chain = InjectionChain::default();
        for idx in 0..depth {
            let pushed = chain.push(record(&format!("hash{idx}"), &format!("base{idx}")));
            prop_assert_eq!(pushed, idx);
        }

        let mut labels = BTreeMap::new();
        labels.insert(extra.clone(), "kept".to_owned());
        chain.apply_to(&mut labels);

        let parsed = InjectionChain::from_labels(&labels);
        prop_assert_eq!(parsed.next_index(), depth);
        prop_assert_eq!(&parsed, &chain);
        prop_assert_eq!(labels.get(&extra).map(String::as_str), Some("kept"));
    }
}
