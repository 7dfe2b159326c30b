//! Event dispatch by kind

use crate::expresslink::CommandEngine;
use crate::peripherals::Peripherals;
use crate::shadow::{PublishFailure, ShadowSynchronizer};
use crate::transport::TransportStream;
use expresslink_shared::{Event, EventKind};
use tracing::{debug, info, warn};

/// Handle one drained event
///
/// Shadow document and delta events fetch the announced document and feed it
/// to the synchronizer. Everything else is logged.
pub async fn dispatch<S: TransportStream>(
    event: &Event,
    engine: &mut CommandEngine<S>,
    sync: &mut ShadowSynchronizer,
    peripherals: &mut dyn Peripherals,
) -> Result<(), PublishFailure> {
    if event.kind.is_shadow() && !sync.handles(event.parameter) {
        warn!("[EVENT] Ignoring event for shadow {}: {}", event.parameter, event);
        return Ok(());
    }

    match event.kind {
        EventKind::ShadowDoc => {
            let result = engine.shadow_get_doc(sync.index()).await;
            if !result.success {
                warn!("[EVENT] Could not fetch shadow document: {}", result);
                return Ok(());
            }
            sync.handle_fetched(engine, peripherals, &result.payload)
                .await
        }
        EventKind::ShadowDelta => {
            let result = engine.shadow_get_delta(sync.index()).await;
            if !result.success {
                warn!("[EVENT] Could not fetch shadow delta: {}", result);
                return Ok(());
            }
            sync.handle_fetched(engine, peripherals, &result.payload)
                .await
        }
        EventKind::ShadowUpdate => {
            let echo = engine.echo();
            engine.set_echo(false);
            let result = engine.shadow_get_update(sync.index()).await;
            engine.set_echo(echo);
            debug!("[EVENT] Shadow update result: {}", result);
            Ok(())
        }
        EventKind::ShadowInit | EventKind::ShadowSubscribeAccepted => {
            info!("[EVENT] {}", event);
            Ok(())
        }
        EventKind::ShadowInitFailed | EventKind::ShadowSubscribeRejected => {
            warn!("[EVENT] {}", event);
            Ok(())
        }
        EventKind::Ota => {
            match engine.ota_state().await {
                Ok(status) => info!("[EVENT] OTA {:?} {}", status.state, status.detail.unwrap_or_default()),
                Err(e) => warn!("[EVENT] OTA state unavailable: {}", e),
            }
            Ok(())
        }
        EventKind::ConnectionLost | EventKind::Overrun | EventKind::SubscribeRejected => {
            warn!("[EVENT] {}", event);
            Ok(())
        }
        EventKind::Unknown(code) => {
            warn!("[EVENT] Unrecognized event {}: {}", code, event);
            Ok(())
        }
        _ => {
            info!("[EVENT] Ignoring event: {}", event);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShadowConfig;
    use crate::expresslink::engine::tests::test_timing;
    use crate::peripherals::SimulatedBadge;
    use crate::transport::testing::MockModule;

    fn event(line: &str) -> Event {
        Event::parse(line).unwrap()
    }

    #[tokio::test]
    async fn test_delta_event_fetches_and_acknowledges() {
        let (stream, module) = MockModule::spawn(|line| match line {
            "AT+SHADOW GET DELTA" => {
                Some("OK 1 {\"state\":{\"desired\":{\"led_brightness\":\"50\"}}}\r\n".into())
            }
            _ => Some("OK\r\n".into()),
        });
        let timing = test_timing();
        let mut el = CommandEngine::new(stream, &timing);
        let mut sync = ShadowSynchronizer::new(&ShadowConfig::default(), &timing, true);
        let mut badge = SimulatedBadge::new();

        dispatch(&event("24 0 SHADOW_DELTA"), &mut el, &mut sync, &mut badge)
            .await
            .unwrap();

        assert_eq!(badge.led_brightness, 0.5);
        assert_eq!(
            module.requests(),
            vec![
                "AT+SHADOW GET DELTA",
                r#"AT+SHADOW UPDATE {"state":{"desired":{"led_brightness":null},"reported":{"led_brightness":"50"}}}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_doc_event_uses_reported_branch() {
        let (stream, module) = MockModule::spawn(|line| match line {
            "AT+SHADOW GET DOC" => {
                Some("OK 1 {\"state\":{\"reported\":{\"display_brightness\":20}}}\r\n".into())
            }
            _ => Some("OK\r\n".into()),
        });
        let timing = test_timing();
        let mut el = CommandEngine::new(stream, &timing);
        let mut sync = ShadowSynchronizer::new(&ShadowConfig::default(), &timing, true);
        let mut badge = SimulatedBadge::new();

        dispatch(&event("22 0 SHADOW_DOC"), &mut el, &mut sync, &mut badge)
            .await
            .unwrap();
        assert_eq!(badge.display_brightness, 0.2);
        assert_eq!(module.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_update_result_only_acknowledged() {
        let (stream, module) = MockModule::scripted(&["OK 1 {\"state\":{}}"]);
        let timing = test_timing();
        let mut el = CommandEngine::new(stream, &timing);
        let mut sync = ShadowSynchronizer::new(&ShadowConfig::default(), &timing, true);
        let mut badge = SimulatedBadge::new();

        dispatch(&event("23 0 SHADOW_UPDATE"), &mut el, &mut sync, &mut badge)
            .await
            .unwrap();
        assert_eq!(module.requests(), vec!["AT+SHADOW GET UPDATE"]);
        assert!(el.echo());
    }

    #[tokio::test]
    async fn test_other_events_send_nothing() {
        let (stream, module) = MockModule::scripted(&[]);
        let timing = test_timing();
        let mut el = CommandEngine::new(stream, &timing);
        let mut sync = ShadowSynchronizer::new(&ShadowConfig::default(), &timing, true);
        let mut badge = SimulatedBadge::new();

        for line in ["3 0 CONLOST", "6 1 CONNECT", "99 0 FUTURE"] {
            dispatch(&event(line), &mut el, &mut sync, &mut badge)
                .await
                .unwrap();
        }
        assert!(module.requests().is_empty());
    }

    #[tokio::test]
    async fn test_named_shadow_filters_events() {
        let (stream, module) = MockModule::spawn(|line| match line {
            "AT+SHADOW2 GET DOC" => Some("OK 1 {\"state\":{}}\r\n".into()),
            _ => Some("OK\r\n".into()),
        });
        let timing = test_timing();
        let named = ShadowConfig {
            index: Some(2),
            ..ShadowConfig::default()
        };
        let mut el = CommandEngine::new(stream, &timing);
        let mut sync = ShadowSynchronizer::new(&named, &timing, true);
        let mut badge = SimulatedBadge::new();

        dispatch(&event("22 0 SHADOW_DOC"), &mut el, &mut sync, &mut badge)
            .await
            .unwrap();
        assert!(module.requests().is_empty());

        dispatch(&event("22 2 SHADOW_DOC"), &mut el, &mut sync, &mut badge)
            .await
            .unwrap();
        assert_eq!(
            module.requests(),
            vec![
                "AT+SHADOW2 GET DOC",
                r#"AT+SHADOW2 UPDATE {"state":{"desired":{},"reported":{}}}"#,
            ]
        );
    }
}
