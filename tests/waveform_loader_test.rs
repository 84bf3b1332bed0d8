//! Integration tests for loading waveforms through a mock session
//!
//! Exercises connect / load / verify / disconnect the way the experiment
//! server drives HSDIO cards, without hardware.

use pxi_daq::codec::{compress, decompress};
use pxi_daq::config::SessionConfig;
use pxi_daq::loader::{load_across_cards, verify, WaveformLoader};
use pxi_daq::session::{serial_query, InstrumentSession, MockSession, SessionError};
use pxi_daq::{DaqError, Waveform};
use std::time::Duration;

fn gate() -> Waveform {
    Waveform::try_new(
        "gate",
        4,
        vec![vec![0, 0, 0, 0], vec![1, 0, 0, 1], vec![0, 1, 1, 0]],
        vec![10, 5, 0],
    )
    .expect("valid waveform")
}

fn config() -> SessionConfig {
    SessionConfig {
        resource: "PXI1Slot2".to_string(),
        timeout_ms: 250,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_load_cycle() {
    let session = MockSession::new();
    session.push_response(b"OK\r".to_vec());

    let mut loader = WaveformLoader::from_config(session.clone(), &config());
    loader.connect("PXI1Slot2").await.unwrap();
    loader.load(&gate()).await.unwrap();
    loader.disconnect().await.unwrap();

    let log = session.call_log();
    assert_eq!(log.first().map(String::as_str), Some("open_session: PXI1Slot2"));
    assert_eq!(log.last().map(String::as_str), Some("close_session"));

    let frames = session.written();
    assert_eq!(frames.len(), 2);
    let record = compress(&gate()).unwrap();
    assert_eq!(frames[1], record.to_le_bytes());
}

#[tokio::test]
async fn test_driver_error_surfaces_as_session_error() {
    let session = MockSession::new();
    let mut loader = WaveformLoader::from_config(session.clone(), &config());
    loader.connect("PXI1Slot2").await.unwrap();

    session.inject_status(-1074118644);
    let err = loader.load(&gate()).await.unwrap_err();
    assert!(matches!(
        err,
        DaqError::Session(SessionError::Driver {
            code: -1074118644,
            ..
        })
    ));
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let session = MockSession::new();
    let mut loader = WaveformLoader::from_config(session.clone(), &config());
    loader.connect("PXI1Slot2").await.unwrap();
    assert!(matches!(
        loader.connect("PXI1Slot2").await,
        Err(DaqError::Session(SessionError::AlreadyOpen(_)))
    ));
    loader.disconnect().await.unwrap();
    loader.connect("PXI1Slot3").await.unwrap();
    assert_eq!(loader.session().resource().as_deref(), Some("PXI1Slot3"));
}

#[tokio::test]
async fn test_two_card_load() {
    let cards = vec![MockSession::new(), MockSession::new()];
    let mut loaders = Vec::new();
    for (slot, card) in cards.iter().enumerate() {
        card.push_response(b"OK\r".to_vec());
        let mut loader = WaveformLoader::new(card.clone(), Duration::from_millis(250));
        loader.connect(&format!("PXI1Slot{}", slot + 2)).await.unwrap();
        loaders.push(loader);
    }

    let mut states: Vec<Vec<u8>> = Vec::new();
    for run in 0..3u8 {
        states.push((0..40).map(|c| (c + run) % 2).collect());
    }
    let wide = Waveform::try_new("wide", 40, states, vec![4, 4, 4]).unwrap();

    load_across_cards(&mut loaders, &wide, 32).await.unwrap();

    assert_eq!(cards[0].written()[0], b"WFM wide 3 32\r".to_vec());
    assert_eq!(cards[1].written()[0], b"WFM wide 3 8\r".to_vec());
    assert_eq!(cards[0].written()[1].len(), 3 * 33 * 4);
    assert_eq!(cards[1].written()[1].len(), 3 * 9 * 4);
}

#[test]
fn test_verify_against_capture() {
    let wf = gate();
    let captured = decompress(&wf).unwrap().into_flat();
    assert!(verify(&wf, &captured).unwrap().is_match());

    let mut glitched = captured.clone();
    glitched[4 * 12 + 1] ^= 1;
    let report = verify(&wf, &glitched).unwrap();
    assert_eq!(report.first_mismatch, Some(12));
}

#[tokio::test]
async fn test_camera_query_over_same_interface() {
    let mut session = MockSession::new();
    session.open_session("img0").await.unwrap();
    session.push_response(b"?AMD\r".to_vec());

    let response = serial_query(&mut session, "?AMD", None, Duration::from_millis(250))
        .await
        .unwrap();
    assert_eq!(response.trim_end(), "?AMD");
}

#[test]
fn test_waveform_json_shape() {
    let json = r#"{"name":"gate","width":2,"states":[[1,0],[0,1]],"transitions":[3,4]}"#;
    let wf: Waveform = serde_json::from_str(json).unwrap();
    assert_eq!(wf.total_samples(), 7);
    assert_eq!(serde_json::to_string(&wf).unwrap(), json);
}
