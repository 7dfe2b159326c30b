//! Badge control loop
//!
//! Owns the command engine, the event drainer, the shadow synchronizer and
//! the peripherals. Everything runs on one task, so commands reach the
//! module strictly one at a time.

use crate::config::BadgeConfig;
use crate::events::{dispatch, EventDrainer};
use crate::expresslink::{CommandEngine, EventSignal};
use crate::peripherals::Peripherals;
use crate::shadow::ShadowSynchronizer;
use crate::transport::TransportStream;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// The badge application
pub struct BadgeController<S, P> {
    engine: CommandEngine<S>,
    drainer: EventDrainer,
    sync: ShadowSynchronizer,
    peripherals: P,
    initial_url: String,
    button_urls: Vec<String>,
    loop_interval: Duration,
}

impl<S: TransportStream, P: Peripherals> BadgeController<S, P> {
    pub fn new(
        engine: CommandEngine<S>,
        peripherals: P,
        signal: Option<Box<dyn EventSignal>>,
        config: &BadgeConfig,
    ) -> Self {
        Self {
            engine,
            drainer: EventDrainer::new(signal, &config.timing),
            sync: ShadowSynchronizer::new(&config.shadow, &config.timing, config.echo.enabled),
            peripherals,
            initial_url: config.shadow.initial_url.clone(),
            button_urls: config.shadow.button_urls.clone(),
            loop_interval: config.timing.loop_interval(),
        }
    }

    pub fn engine(&self) -> &CommandEngine<S> {
        &self.engine
    }

    pub fn synchronizer(&self) -> &ShadowSynchronizer {
        &self.sync
    }

    pub fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }

    /// Connect to AWS IoT and start shadow synchronization
    pub async fn startup(&mut self) -> Result<()> {
        let result = self.engine.connect(false).await;
        if !result.success {
            bail!("Unable to connect: {}", result);
        }
        info!("[BADGE] Connected: {}", result.payload);
        match self.engine.connection_status().await {
            Ok(status) if !status.customer_account => {
                info!("[BADGE] Module is connected to the staging account")
            }
            Ok(_) => {}
            Err(e) => warn!("[BADGE] {}", e),
        }

        let url = self.initial_url.clone();
        if let Err(e) = self
            .sync
            .share_url(&mut self.engine, &mut self.peripherals, &url)
            .await
        {
            warn!("[BADGE] Initial report not published: {}", e);
        }

        let thing_name = self
            .engine
            .thing_name()
            .await
            .context("Failed to read ThingName")?;
        info!("[BADGE] Thing name: {}", thing_name);

        self.engine
            .enable_shadow(true)
            .await
            .context("Failed to enable shadow")?;

        let index = self.sync.index();
        for (step, result) in [
            ("init", self.engine.shadow_init(index).await),
            ("doc", self.engine.shadow_doc(index).await),
            ("subscribe", self.engine.shadow_subscribe(index).await),
        ] {
            if !result.success {
                warn!("[BADGE] Shadow {} failed: {}", step, result);
            }
        }
        Ok(())
    }

    /// One loop iteration: drain events, periodic report, button presses
    pub async fn run_once(&mut self) {
        self.peripherals.update();

        if self.drainer.begin_cycle(Instant::now()) {
            while let Some(event) = self.drainer.next_event(&mut self.engine).await {
                self.peripherals.update();
                if let Err(e) = dispatch(
                    &event,
                    &mut self.engine,
                    &mut self.sync,
                    &mut self.peripherals,
                )
                .await
                {
                    warn!("[BADGE] {}", e);
                }
            }
        }

        if let Err(e) = self
            .sync
            .tick(&mut self.engine, &mut self.peripherals, Instant::now())
            .await
        {
            warn!("[BADGE] Periodic report: {}", e);
        }

        while let Some(button) = self.peripherals.poll_button_press() {
            let Some(url) = self.button_urls.get(button).cloned() else {
                continue;
            };
            info!("[BADGE] Button {} pressed", button + 1);
            if let Err(e) = self
                .sync
                .share_url(&mut self.engine, &mut self.peripherals, &url)
                .await
            {
                warn!("[BADGE] {}", e);
            }
        }

        self.drainer.finish_cycle();
    }

    /// Run the control loop forever
    pub async fn run(&mut self) {
        loop {
            self.run_once().await;
            tokio::time::sleep(self.loop_interval).await;
        }
    }

    /// Disconnect and close the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        let result = self.engine.disconnect().await;
        if !result.success {
            warn!("[BADGE] Disconnect failed: {}", result);
        }
        self.engine.shutdown().await
    }
}
