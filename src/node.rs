//! One bus node: every poller, the optional local service, and the
//! scheduler that drives them.
//!
//! The main loop owns a [`Node`] plus the concrete bus adapters and calls
//! [`Node::tick`] with the time that passed.  Because the master transport
//! is borrowed mutably for the whole tick, poll cycles of different peers
//! never interleave on the bus.

use log::{info, warn};

use crate::app::ports::{BusTransport, EventSink, Pollable, SchedulerDelegate, SlavePort};
use crate::client::ClientRegistryPoller;
use crate::config::NodeConfig;
use crate::error::{BusError, ConfigError, Result, SwitchError};
use crate::protocol::SwitchCommand;
use crate::scheduler::{MAX_SCHEDULES, Schedule, Scheduler};
use crate::service::{LocalEndpoint, ServiceBuilder, SlaveRegistryService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Poll(usize),
    Update,
}

/// Collects the slots that fired during one scheduler tick.
#[derive(Default)]
struct DueSlots(heapless::Vec<usize, MAX_SCHEDULES>);

impl SchedulerDelegate for DueSlots {
    fn on_schedule_fired(&mut self, slot: usize, _label: &str) {
        // At most one fire per slot per tick, so this never overflows.
        let _ = self.0.push(slot);
    }
}

pub struct Node {
    pollers: Vec<ClientRegistryPoller>,
    service: Option<SlaveRegistryService>,
    scheduler: Scheduler,
    tasks: heapless::Vec<(usize, Task), MAX_SCHEDULES>,
}

impl Node {
    /// Build every poller and the local service, and give each its own
    /// schedule slot.  Local endpoints are resolved by name.
    pub fn from_config<F>(config: &NodeConfig, resolve: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<LocalEndpoint>,
    {
        let pollers = config
            .peers
            .iter()
            .map(ClientRegistryPoller::new)
            .collect::<core::result::Result<Vec<_>, _>>()?;
        let service = match &config.service {
            Some(svc) => Some(ServiceBuilder::from_config(svc, resolve)?),
            None => None,
        };

        let mut scheduler = Scheduler::new();
        let mut tasks = heapless::Vec::new();
        for (i, poller) in pollers.iter().enumerate() {
            let slot = scheduler
                .add(Schedule::periodic(poller.label(), poller.update_interval_ms()))
                .ok_or(ConfigError::TooManyBindings)?;
            tasks
                .push((slot, Task::Poll(i)))
                .map_err(|_| ConfigError::TooManyBindings)?;
        }
        if let Some(svc) = &service {
            let slot = scheduler
                .add(Schedule::periodic(svc.label(), svc.update_interval_ms()))
                .ok_or(ConfigError::TooManyBindings)?;
            tasks
                .push((slot, Task::Update))
                .map_err(|_| ConfigError::TooManyBindings)?;
        }

        Ok(Self {
            pollers,
            service,
            scheduler,
            tasks,
        })
    }

    pub fn pollers(&self) -> &[ClientRegistryPoller] {
        &self.pollers
    }

    pub fn poller(&self, name: &str) -> Option<&ClientRegistryPoller> {
        self.pollers.iter().find(|p| p.name() == name)
    }

    pub fn service(&self) -> Option<&SlaveRegistryService> {
        self.service.as_ref()
    }

    pub fn service_mut(&mut self) -> Option<&mut SlaveRegistryService> {
        self.service.as_mut()
    }

    /// Run every task once without waiting for its interval: the service
    /// samples its sources first, then each peer is polled.
    pub fn start<B, S>(&mut self, bus: &mut B, sink: &mut S)
    where
        B: BusTransport + ?Sized,
        S: EventSink + ?Sized,
    {
        if let Some(svc) = &mut self.service {
            svc.update();
        }
        for poller in &mut self.pollers {
            poller.poll_cycle(bus, sink);
        }
    }

    /// Advance the scheduler by `elapsed_ms` and run whatever is due, in
    /// slot order.  Returns the number of tasks run.
    pub fn tick<B, S>(&mut self, elapsed_ms: u32, bus: &mut B, sink: &mut S) -> usize
    where
        B: BusTransport + ?Sized,
        S: EventSink + ?Sized,
    {
        let mut due = DueSlots::default();
        self.scheduler.tick(elapsed_ms, &mut due);

        let mut ran = 0;
        for slot in due.0 {
            let Some(&(_, task)) = self.tasks.iter().find(|(s, _)| *s == slot) else {
                continue;
            };
            match task {
                Task::Poll(i) => {
                    if let Some(poller) = self.pollers.get_mut(i) {
                        poller.poll_cycle(bus, sink);
                    }
                }
                Task::Update => {
                    if let Some(svc) = &mut self.service {
                        svc.update();
                    }
                }
            }
            ran += 1;
        }
        ran
    }

    /// Answer whatever the remote master wrote to the local service.
    pub fn serve<P: SlavePort>(&mut self, port: &mut P) -> core::result::Result<usize, BusError> {
        match &mut self.service {
            Some(svc) => svc.serve(port),
            None => Ok(0),
        }
    }

    /// Command switch `endpoint` on peer `peer`.
    pub fn request_switch<B>(
        &mut self,
        peer: &str,
        endpoint: &str,
        command: SwitchCommand,
        bus: &mut B,
    ) -> Result<()>
    where
        B: BusTransport + ?Sized,
    {
        let Some(poller) = self.pollers.iter_mut().find(|p| p.name() == peer) else {
            warn!("Node: no peer '{}'", peer);
            return Err(SwitchError::NotASwitch.into());
        };
        let id = poller.find(endpoint).ok_or(SwitchError::NotASwitch)?;
        poller.request_switch(id, command, bus)?;
        Ok(())
    }

    pub fn dump_config(&self) {
        info!(
            "Node: {} peer(s), service {}",
            self.pollers.len(),
            if self.service.is_some() { "on" } else { "off" }
        );
        for poller in &self.pollers {
            poller.dump_config();
        }
        if let Some(svc) = &self.service {
            svc.dump_config();
        }
    }
}
