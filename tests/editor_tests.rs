mod common;

use std::time::Duration;

use common::{Call, spawn_engine, wait_for};
use tunbox_core::backend::OverrideKind;
use tunbox_core::{EditorKind, PushEvent};

#[tokio::test(start_paused = true)]
async fn opening_with_malformed_content_falls_back_to_the_raw_text() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Tun);
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::GetOverride {
            kind: OverrideKind::Tun
        }
    );
    reply.send("{not json".into()).unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;
    let editor = snapshot.editor.unwrap();
    assert_eq!(editor.content, "{not json");
}

#[tokio::test(start_paused = true)]
async fn opening_pretty_prints_structured_content() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Mixed);
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::GetOverride {
            kind: OverrideKind::Mixed
        }
    );
    reply
        .send(r#"{"type":"mixed","listen_port":7893}"#.into())
        .unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;
    let editor = snapshot.editor.unwrap();
    assert!(editor.content.contains("\"listen_port\": 7893"));
    assert!(editor.content.lines().count() > 1);
}

#[tokio::test(start_paused = true)]
async fn mirror_editor_loads_the_in_memory_url_without_a_fetch() {
    let harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Mirror);
    let snapshot = wait_for(&harness.handle, |snapshot| snapshot.editor.is_some()).await;
    let editor = snapshot.editor.unwrap();
    assert!(!editor.loading);
    assert_eq!(editor.content, "https://gh-proxy.com/");
}

#[tokio::test(start_paused = true)]
async fn save_while_running_posts_restart_required_and_auto_closes() {
    let mut harness = spawn_engine().await;

    harness.push(PushEvent::Status(true));
    wait_for(&harness.handle, |snapshot| snapshot.connection.running()).await;

    harness.handle.open_editor(EditorKind::Tun);
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("{}".into()).unwrap();
    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;

    // Malformed input is saved verbatim: the editor is a trusted raw
    // pass-through.
    harness.handle.set_editor_content("{not json");
    harness.handle.save_editor();
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::SaveOverride {
            kind: OverrideKind::Tun,
            content: "{not json".into()
        }
    );
    reply.send("Success".into()).unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot.editor.as_ref().is_some_and(|editor| editor.saved)
    })
    .await;
    assert_eq!(snapshot.connection.status().text, "RESTART TO APPLY");

    tokio::time::sleep(Duration::from_millis(900)).await;
    wait_for(&harness.handle, |snapshot| snapshot.editor.is_none()).await;
}

#[tokio::test(start_paused = true)]
async fn save_while_stopped_skips_the_restart_notice() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Tun);
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("{}".into()).unwrap();
    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;

    harness.handle.save_editor();
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("Success".into()).unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot.editor.as_ref().is_some_and(|editor| editor.saved)
    })
    .await;
    assert_ne!(snapshot.connection.status().text, "RESTART TO APPLY");
}

#[tokio::test(start_paused = true)]
async fn mirror_save_persists_url_and_enabled_flag_as_a_unit() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Mirror);
    wait_for(&harness.handle, |snapshot| snapshot.editor.is_some()).await;

    harness.handle.set_editor_content("https://mirror.example/");
    harness.handle.save_editor();
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::SaveMirrorSettings {
            url: "https://mirror.example/".into(),
            enabled: true
        }
    );
    reply.send("Success".into()).unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot.settings.mirror.url == "https://mirror.example/"
    })
    .await;
    assert!(snapshot.settings.mirror.enabled);
}

#[tokio::test(start_paused = true)]
async fn reset_of_the_mirror_editor_substitutes_the_default_locally() {
    let harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Mirror);
    wait_for(&harness.handle, |snapshot| snapshot.editor.is_some()).await;
    harness.handle.set_editor_content("https://mirror.example/");
    harness.handle.reset_editor();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| editor.content == "https://gh-proxy.com/")
    })
    .await;
    assert!(snapshot.editor.is_some());
}

#[tokio::test(start_paused = true)]
async fn reset_refetches_and_pretty_prints_on_success() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Tun);
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("{\"a\":1}".into()).unwrap();
    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;

    harness.handle.reset_editor();
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::ResetOverride {
            kind: OverrideKind::Tun
        }
    );
    reply.send("Success".into()).unwrap();
    let (call, reply) = harness.driver.expect_call().await;
    assert_eq!(
        call,
        Call::GetOverride {
            kind: OverrideKind::Tun
        }
    );
    reply.send(r#"{"type":"tun","mtu":9000}"#.into()).unwrap();

    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| editor.content.contains("\"mtu\": 9000"))
    })
    .await;
    assert!(snapshot.editor.is_some());
}

#[tokio::test(start_paused = true)]
async fn reset_round_trip_failure_displays_the_error_literal() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Tun);
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("{}".into()).unwrap();
    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;

    harness.handle.reset_editor();
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("Write Error: disk full".into()).unwrap();

    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| editor.content == "Error")
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn opening_a_new_session_discards_the_previous_one() {
    let mut harness = spawn_engine().await;

    harness.handle.open_editor(EditorKind::Tun);
    let (_, reply) = harness.driver.expect_call().await;
    reply.send("{\"a\":1}".into()).unwrap();
    wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| !editor.loading)
    })
    .await;
    harness.handle.set_editor_content("unsaved edits");

    // No merge, no prompt: the mirror session simply replaces it.
    harness.handle.open_editor(EditorKind::Mirror);
    let snapshot = wait_for(&harness.handle, |snapshot| {
        snapshot
            .editor
            .as_ref()
            .is_some_and(|editor| editor.kind == EditorKind::Mirror)
    })
    .await;
    assert_eq!(
        snapshot.editor.unwrap().content,
        "https://gh-proxy.com/"
    );
}
