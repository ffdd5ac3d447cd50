//! System coordinator: wiring, worker lifecycle and the main loop.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast::error::RecvError,
};

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    providers::{
        AlarmSchedulerServiceProvider, ClockDisplayServiceProvider, LightServiceProvider,
        ServiceProvider, SwitchMonitorServiceProvider,
    },
    switch::{Switch, SwitchEvent},
    task_manager::TaskManager,
};

/// Owns the workers and decides when the daemon stops.
///
/// Switch listeners installed by [`initialize`](Self::initialize) only wake
/// the affected workers; all real work happens on the workers' own tasks.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        let event_bus = EventBus::new();
        Self {
            task_manager: TaskManager::new(event_bus.clone()),
            event_bus,
            service_providers: Vec::new(),
        }
    }

    /// Wires the switch listeners and registers a service per worker.
    pub fn initialize(&mut self, state: AppState) -> Result<()> {
        info!("Initializing SystemCoordinator...");
        let AppState {
            switches,
            monitors,
            scheduler,
            light,
            clock_display,
        } = state;

        let light_handle = light.handle();
        let display = clock_display.handle();
        let recompute = scheduler.waker();

        {
            let light_handle = light_handle.clone();
            switches
                .light
                .register(SwitchEvent::Changed, move |_: SwitchEvent, _: bool| {
                    light_handle.switch_changed()
                });
        }
        {
            let light_handle = light_handle.clone();
            let display = display.clone();
            switches
                .alarm
                .register(SwitchEvent::Changed, move |_: SwitchEvent, _: bool| {
                    recompute.wake();
                    light_handle.switch_changed();
                    display.wake();
                });
        }
        {
            let display = display.clone();
            switches
                .alarm
                .register(SwitchEvent::On, move |_: SwitchEvent, _: bool| {
                    display.show_alarm_preview()
                });
        }
        switches
            .clock
            .register(SwitchEvent::Changed, move |_: SwitchEvent, _: bool| {
                display.wake()
            });
        for switch in [&switches.light, &switches.alarm, &switches.clock] {
            self.publish_changes(switch);
        }

        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(AlarmSchedulerServiceProvider::new(scheduler)),
            Box::new(LightServiceProvider::new(light)),
            Box::new(ClockDisplayServiceProvider::new(clock_display)),
        ];
        providers.extend(monitors.into_iter().map(|monitor| {
            Box::new(SwitchMonitorServiceProvider::new(monitor)) as Box<dyn ServiceProvider>
        }));
        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
        Ok(())
    }

    fn publish_changes(&self, switch: &Switch) {
        let event_bus = self.event_bus.clone();
        let role = switch.role();
        switch.register(SwitchEvent::Changed, move |_: SwitchEvent, on: bool| {
            // No subscriber just means the main loop is not running yet.
            let _ = event_bus.publish(Event::SwitchChanged { switch: role, on });
        });
    }

    /// Starts all registered services in priority order.
    pub async fn start_all_services(&mut self) -> Result<()> {
        info!(
            "Starting {} services in priority order...",
            self.service_providers.len()
        );

        for provider in &self.service_providers {
            let is_critical = provider.is_critical();
            match provider.start(&mut self.task_manager).await {
                Ok(()) => {
                    info!(
                        "Service '{}' started (priority: {}, critical: {})",
                        provider.name(),
                        provider.priority(),
                        is_critical
                    );
                }
                Err(e) if is_critical => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => {
                    warn!(
                        "Non-critical service '{}' failed to start: {e:#}",
                        provider.name()
                    );
                }
            }
        }

        info!("All critical services started successfully");
        Ok(())
    }

    /// Runs until SIGINT, SIGTERM or a worker failure, then shuts down.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let mut event_rx = self.event_bus.subscribe();
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        info!("Starting main event loop");

        let outcome = loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, initiating graceful shutdown...");
                    break result.context("Failed to listen for SIGINT");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown...");
                    break Ok(());
                }
                event = event_rx.recv() => {
                    if let Some(outcome) = self.handle_event(event) {
                        break outcome;
                    }
                }
            }
        };

        self.shutdown().await;
        info!("Main event loop terminated");
        outcome
    }

    /// Returns `Some` when the loop has to stop.
    fn handle_event(&self, event: Result<Event, RecvError>) -> Option<Result<()>> {
        match event {
            Ok(Event::SwitchChanged { switch, on }) => {
                debug!("{switch} switch turned {}", if on { "on" } else { "off" });
                None
            }
            Ok(Event::WorkerFailed { name, error }) => {
                error!("Worker '{name}' failed, shutting down");
                Some(Err(anyhow::anyhow!("Worker '{name}' failed: {error}")))
            }
            Err(RecvError::Lagged(n)) => {
                warn!("Event bus lagged by {n} messages");
                None
            }
            Err(RecvError::Closed) => Some(Err(anyhow::anyhow!(
                "Event bus channel closed unexpectedly"
            ))),
        }
    }

    /// Cancels every worker; the controllers blank their outputs on the way out.
    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.task_manager.shutdown_all().await {
            error!("Error during task shutdown: {e:#}");
        }
        info!("Shutdown complete");
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}
