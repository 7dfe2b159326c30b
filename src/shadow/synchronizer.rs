//! Shadow Synchronizer
//!
//! Applies desired state to the badge, acknowledges it, and publishes
//! periodic reports of values that changed since the last successful
//! publish.

use super::bindings::{self, Binding, ConfigFlag, REPORTED};
use crate::config::{ShadowConfig, TimingConfig};
use crate::expresslink::CommandEngine;
use crate::peripherals::{ActuatorCommand, Peripherals};
use crate::transport::TransportStream;
use expresslink_shared::shadow::{acknowledgement_payload, report_payload};
use expresslink_shared::{CommandResult, FetchedDocument, PropertyMap, ShadowDocument};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A shadow update the module did not accept
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Shadow update failed: {0}")]
pub struct PublishFailure(pub CommandResult);

/// Desired/reported state synchronization for one shadow
pub struct ShadowSynchronizer {
    index: Option<u8>,
    current_url: String,
    last_reported: PropertyMap,
    default_rate: Duration,
    high_rate: Duration,
    update_rate: Duration,
    next_report: Instant,
    echo: bool,
}

impl ShadowSynchronizer {
    pub fn new(shadow: &ShadowConfig, timing: &TimingConfig, echo: bool) -> Self {
        Self {
            index: shadow.index,
            current_url: String::new(),
            last_reported: PropertyMap::new(),
            default_rate: timing.update_rate(),
            high_rate: timing.high_update_rate(),
            update_rate: timing.update_rate(),
            next_report: Instant::now(),
            echo,
        }
    }

    pub fn index(&self) -> Option<u8> {
        self.index
    }

    /// Whether an event parameter refers to this shadow
    ///
    /// Only a named shadow filters; the classic shadow takes every event.
    pub fn handles(&self, shadow_index: u32) -> bool {
        self.index
            .map_or(true, |index| u32::from(index) == shadow_index)
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Values acknowledged by the last successful publishes
    pub fn last_reported(&self) -> &PropertyMap {
        &self.last_reported
    }

    pub fn update_rate(&self) -> Duration {
        self.update_rate
    }

    pub fn is_high_rate(&self) -> bool {
        self.update_rate == self.high_rate && self.high_rate != self.default_rate
    }

    /// Handle the payload of `SHADOW GET DOC` / `SHADOW GET DELTA`
    pub async fn handle_fetched<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
        payload: &str,
    ) -> Result<(), PublishFailure> {
        match FetchedDocument::parse(payload) {
            Ok(FetchedDocument::Accepted(document)) => {
                self.handle_document(engine, peripherals, document).await
            }
            Ok(FetchedDocument::Rejected(reason)) => {
                warn!("[SHADOW] Document rejected: {}", reason);
                Ok(())
            }
            Err(e) => {
                warn!("[SHADOW] Ignoring undecodable document: {}", e);
                Ok(())
            }
        }
    }

    /// Apply a document's operative branch and acknowledge it
    pub async fn handle_document<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
        document: ShadowDocument,
    ) -> Result<(), PublishFailure> {
        let (branch, properties) = document.operative();
        debug!(
            "[SHADOW] Applying {} properties from {:?} branch",
            properties.len(),
            branch
        );

        let (desired, reported) = self.apply(engine, peripherals, properties).await;
        self.publish(engine, acknowledgement_payload(desired, reported))
            .await
    }

    /// Apply properties in order; returns the nulled-desired and reported maps
    async fn apply<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
        properties: PropertyMap,
    ) -> (PropertyMap, PropertyMap) {
        let mut desired = PropertyMap::new();
        let mut reported = PropertyMap::new();

        for (name, value) in properties {
            desired.insert(name.clone(), Value::Null);

            match bindings::lookup(&name) {
                None => {
                    debug!("[SHADOW] Unknown property {} echoed", name);
                    reported.insert(name, value);
                }
                Some(Binding::Getter(_)) => {
                    debug!("[SHADOW] {} is read-only", name);
                    reported.insert(name, value);
                }
                Some(Binding::Config(ConfigFlag::HighUpdateRate)) => {
                    self.set_high_rate(engine, bindings::truthy(&value));
                    reported.insert(name, value);
                }
                Some(Binding::Setter(actuator)) | Some(Binding::CompositeSetter(actuator)) => {
                    // Rejected values are cleared from desired but not reported
                    let command = match bindings::coerce(actuator, &value) {
                        Ok(command) => command,
                        Err(e) => {
                            warn!("[SHADOW] Not applying {}: {}", name, e);
                            continue;
                        }
                    };
                    reported.insert(name, bindings::effective_value(actuator, &value));

                    if let ActuatorCommand::ShareUrl(url) = &command {
                        if let Err(e) = self.share_url(engine, peripherals, url).await {
                            warn!("[SHADOW] {}", e);
                        }
                        continue;
                    }

                    peripherals.apply(&command);
                    for (key, source) in bindings::readback(&command) {
                        if let Some(v) = bindings::sample(*source, peripherals, &self.current_url) {
                            reported.insert(key.to_string(), v);
                        }
                    }
                }
            }
        }

        (desired, reported)
    }

    fn set_high_rate<S: TransportStream>(&mut self, engine: &mut CommandEngine<S>, enabled: bool) {
        if enabled {
            self.update_rate = self.high_rate;
            engine.set_echo(false);
            info!("[SHADOW] High update rate; command echo silenced");
        } else {
            self.update_rate = self.default_rate;
            engine.set_echo(self.echo);
            info!("[SHADOW] Normal update rate");
        }
    }

    /// Publish an update document
    async fn publish<S: TransportStream>(
        &self,
        engine: &mut CommandEngine<S>,
        payload: Value,
    ) -> Result<(), PublishFailure> {
        let result = engine.shadow_update(&payload.to_string(), self.index).await;
        if result.success {
            Ok(())
        } else {
            warn!("[SHADOW] Update not accepted: {}", result);
            Err(PublishFailure(result))
        }
    }

    /// Sample every reported source
    pub fn sample_all(&self, peripherals: &mut dyn Peripherals) -> PropertyMap {
        REPORTED
            .iter()
            .filter_map(|(name, source)| {
                bindings::sample(*source, peripherals, &self.current_url)
                    .map(|v| (name.to_string(), v))
            })
            .collect()
    }

    /// Entries of `sampled` that differ from the last reported values
    pub fn changed_values(&self, sampled: PropertyMap) -> PropertyMap {
        sampled
            .into_iter()
            .filter(|(name, value)| self.last_reported.get(name) != Some(value))
            .collect()
    }

    /// Publish values that changed since the last successful report
    ///
    /// Returns the published entries (empty when nothing changed). The cache
    /// is only updated once the module accepts the update.
    pub async fn report_changed<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
    ) -> Result<PropertyMap, PublishFailure> {
        let changed = self.changed_values(self.sample_all(peripherals));
        if changed.is_empty() {
            return Ok(changed);
        }

        self.publish(engine, report_payload(changed.clone())).await?;
        for (name, value) in &changed {
            self.last_reported.insert(name.clone(), value.clone());
        }
        Ok(changed)
    }

    /// Periodic report; `None` when not yet due
    pub async fn tick<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
        now: Instant,
    ) -> Result<Option<PropertyMap>, PublishFailure> {
        if now < self.next_report {
            return Ok(None);
        }
        self.next_report = now + self.update_rate;
        self.report_changed(engine, peripherals).await.map(Some)
    }

    /// Share a URL on the NFC tag and QR code, then report changes
    pub async fn share_url<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
        peripherals: &mut dyn Peripherals,
        url: &str,
    ) -> Result<PropertyMap, PublishFailure> {
        info!("[SHADOW] Sharing {} (was {:?})", url, self.current_url);
        peripherals.apply(&ActuatorCommand::ShareUrl(url.to_string()));
        self.current_url = url.to_string();
        self.report_changed(engine, peripherals).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expresslink::engine::tests::test_timing;
    use crate::peripherals::{BackLedMode, LedAnimation, SimulatedBadge};
    use crate::transport::testing::MockModule;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    struct Harness {
        engine: CommandEngine<DuplexStream>,
        module: MockModule,
        sync: ShadowSynchronizer,
        badge: SimulatedBadge,
        accept: Arc<AtomicBool>,
    }

    fn harness() -> Harness {
        let accept = Arc::new(AtomicBool::new(true));
        let flag = accept.clone();
        let (stream, module) = MockModule::spawn(move |_| {
            if flag.load(Ordering::SeqCst) {
                Some("OK\r\n".into())
            } else {
                Some("ERR6 NO CONNECTION\r\n".into())
            }
        });
        let timing = test_timing();
        Harness {
            engine: CommandEngine::new(stream, &timing),
            module,
            sync: ShadowSynchronizer::new(&ShadowConfig::default(), &timing, true),
            badge: SimulatedBadge::new(),
            accept,
        }
    }

    fn updates(module: &MockModule) -> Vec<String> {
        module
            .requests()
            .into_iter()
            .filter_map(|r| r.strip_prefix("AT+SHADOW UPDATE ").map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_display_brightness_round_trip() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"desired":{"display_brightness":50}}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();

        assert_eq!(h.badge.display_brightness, 0.5);
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"display_brightness":null},"reported":{"display_brightness":50}}}"#]
        );
    }

    #[tokio::test]
    async fn test_led_brightness_delta_ack() {
        let mut h = harness();
        h.sync
            .handle_fetched(
                &mut h.engine,
                &mut h.badge,
                r#"1 {"state":{"desired":{"led_brightness":"50"}}}"#,
            )
            .await
            .unwrap();

        assert_eq!(h.badge.led_brightness, 0.5);
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"led_brightness":null},"reported":{"led_brightness":"50"}}}"#]
        );
    }

    #[tokio::test]
    async fn test_ack_sent_for_empty_branch() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"state":{"desired":{}}}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{},"reported":{}}}"#]
        );
    }

    #[tokio::test]
    async fn test_unknown_property_echoed() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"reported":{"mood":"happy","temperature":99}}"#)
            .unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"mood":null,"temperature":null},"reported":{"mood":"happy","temperature":99}}}"#]
        );
        assert_eq!(h.badge.temperature, 22.0);
    }

    #[tokio::test]
    async fn test_static_animation_reads_back_leds() {
        let mut h = harness();
        h.badge.leds = [[0, 0, 1], [0, 0, 2], [0, 0, 3], [0, 0, 4], [0, 0, 5]];
        let doc = ShadowDocument::parse(r#"{"led_animation":"Static"}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();

        assert_eq!(h.badge.animation, LedAnimation::Static);
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"led_animation":null},"reported":{"led_animation":"Static","led_1":1,"led_2":2,"led_3":3,"led_4":4,"led_5":5}}}"#]
        );
    }

    #[tokio::test]
    async fn test_invalid_value_cleared_but_not_reported() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"desired":{"back_led":"sideways"}}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();
        assert_eq!(h.badge.back_led, BackLedMode::Off);
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"back_led":null},"reported":{}}}"#]
        );
    }

    #[tokio::test]
    async fn test_ack_reports_applied_values() {
        let mut h = harness();
        let doc = ShadowDocument::parse(
            r#"{"desired":{"back_led":"sideways","display_brightness":250}}"#,
        )
        .unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();

        assert_eq!(h.badge.back_led, BackLedMode::Off);
        assert_eq!(h.badge.display_brightness, 1.0);
        assert_eq!(
            updates(&h.module),
            vec![r#"{"state":{"desired":{"back_led":null,"display_brightness":null},"reported":{"display_brightness":100}}}"#]
        );
    }

    #[tokio::test]
    async fn test_rejected_document_ignored() {
        let mut h = harness();
        h.sync
            .handle_fetched(&mut h.engine, &mut h.badge, "0 No shadow exists")
            .await
            .unwrap();
        h.sync
            .handle_fetched(&mut h.engine, &mut h.badge, "1 {not json")
            .await
            .unwrap();
        assert!(h.module.requests().is_empty());
    }

    #[tokio::test]
    async fn test_periodic_report_only_changes() {
        let mut h = harness();
        h.badge.temperature = 21.0;
        h.badge.humidity = 45.0;

        let first = h
            .sync
            .report_changed(&mut h.engine, &mut h.badge)
            .await
            .unwrap();
        assert_eq!(first.len(), REPORTED.len());

        h.badge.temperature = 21.5;
        let second = h
            .sync
            .report_changed(&mut h.engine, &mut h.badge)
            .await
            .unwrap();
        assert_eq!(second, json!({"temperature": 21.5}).as_object().cloned().unwrap());
        assert_eq!(
            updates(&h.module).last().unwrap(),
            r#"{"state":{"reported":{"temperature":21.5}}}"#
        );
        assert_eq!(h.sync.last_reported()["humidity"], json!(45.0));
    }

    #[tokio::test]
    async fn test_identical_sample_yields_empty_change_set() {
        let mut h = harness();
        h.sync
            .report_changed(&mut h.engine, &mut h.badge)
            .await
            .unwrap();
        let published = updates(&h.module).len();

        let changed = h
            .sync
            .report_changed(&mut h.engine, &mut h.badge)
            .await
            .unwrap();
        assert!(changed.is_empty());
        assert_eq!(updates(&h.module).len(), published);
    }

    #[test]
    fn test_changed_values_is_pure_diff() {
        let sync = ShadowSynchronizer::new(&ShadowConfig::default(), &test_timing(), true);
        let sampled = json!({"temperature": 21.0, "humidity": 40.0})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(sync.changed_values(sampled.clone()), sampled);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_cache_stale() {
        let mut h = harness();
        h.accept.store(false, Ordering::SeqCst);

        let result = h.sync.report_changed(&mut h.engine, &mut h.badge).await;
        assert!(matches!(result, Err(PublishFailure(ref r)) if r.error_code == Some(6)));
        assert!(h.sync.last_reported().is_empty());

        h.accept.store(true, Ordering::SeqCst);
        let retried = h
            .sync
            .report_changed(&mut h.engine, &mut h.badge)
            .await
            .unwrap();
        assert_eq!(retried.len(), REPORTED.len());
        assert_eq!(updates(&h.module).len(), 2);
    }

    #[tokio::test]
    async fn test_shared_url_reports_immediately() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"desired":{"shared_url":"https://example.com"}}"#)
            .unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();

        assert_eq!(h.sync.current_url(), "https://example.com");
        assert_eq!(h.badge.shared_url.as_deref(), Some("https://example.com"));
        assert_eq!(h.sync.last_reported()["shared_url"], json!("https://example.com"));

        let published = updates(&h.module);
        assert_eq!(published.len(), 2);
        assert!(published[0].starts_with(r#"{"state":{"reported":{"temperature""#));
        assert_eq!(
            published[1],
            r#"{"state":{"desired":{"shared_url":null},"reported":{"shared_url":"https://example.com"}}}"#
        );
    }

    #[tokio::test]
    async fn test_high_update_rate_toggle() {
        let mut h = harness();
        let doc = ShadowDocument::parse(r#"{"desired":{"high_update_rate":true}}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();
        assert!(h.sync.is_high_rate());
        assert_eq!(h.sync.update_rate(), Duration::from_millis(100));
        assert!(!h.engine.echo());

        let doc = ShadowDocument::parse(r#"{"desired":{"high_update_rate":false}}"#).unwrap();
        h.sync
            .handle_document(&mut h.engine, &mut h.badge, doc)
            .await
            .unwrap();
        assert!(!h.sync.is_high_rate());
        assert_eq!(h.sync.update_rate(), Duration::from_millis(4000));
        assert!(h.engine.echo());
    }

    #[tokio::test]
    async fn test_tick_waits_for_interval() {
        let mut h = harness();
        let start = Instant::now();

        let first = h
            .sync
            .tick(&mut h.engine, &mut h.badge, start)
            .await
            .unwrap();
        assert!(first.is_some());

        h.badge.temperature = 30.0;
        let early = h
            .sync
            .tick(&mut h.engine, &mut h.badge, start + Duration::from_millis(10))
            .await
            .unwrap();
        assert!(early.is_none());

        let due = h
            .sync
            .tick(&mut h.engine, &mut h.badge, start + Duration::from_millis(4000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(due.keys().map(String::as_str).collect::<Vec<_>>(), vec!["temperature"]);
    }

    #[test]
    fn test_handles_shadow_index() {
        let classic = ShadowSynchronizer::new(&ShadowConfig::default(), &test_timing(), true);
        assert!(classic.handles(0));
        assert!(classic.handles(1));

        let named = ShadowConfig {
            index: Some(2),
            ..ShadowConfig::default()
        };
        let sync = ShadowSynchronizer::new(&named, &test_timing(), true);
        assert!(sync.handles(2));
        assert!(!sync.handles(0));
    }
}
