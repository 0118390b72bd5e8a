//! Scenario builder and world state.
//!
//! A scenario declares named clients and a list of steps, then MUST be
//! given an oracle before it can run: verification is not optional. The
//! world drives each client machine with virtual time and routes scripted
//! server deliveries between machines, preserving per-client arrival order.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use confab_client::client::{Client, ClientAction, ClientConfig, ClientEvent, Notification};
use confab_client::dispatch::Intent;
use confab_proto::event::ServerEvent;

use crate::script::ScriptedServer;

/// Oracle verifying global state after a scenario run.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

#[derive(Debug, Clone)]
enum Step {
    Connect { client: String },
    Intent { client: String, intent: Intent },
    DropChannel { client: String, reason: String },
    Disconnect { client: String },
    Deliver { client: String, event: ServerEvent },
    Advance { duration: Duration },
}

/// Scenario builder.
///
/// Construct a scenario by adding clients and steps, then call
/// [`Scenario::oracle`] to obtain a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    config: ClientConfig,
    clients: Vec<String>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name and default client config.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), config: ClientConfig::default(), clients: Vec::new(), steps: Vec::new() }
    }

    /// Use this client configuration for every client in the scenario.
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a named client. Its token is `token-<name>`, accepted by the
    /// scripted server as user `u<index>`.
    #[must_use]
    pub fn client(mut self, name: impl Into<String>) -> Self {
        self.clients.push(name.into());
        self
    }

    /// Connect a client with its registered token.
    #[must_use]
    pub fn connect(mut self, client: impl Into<String>) -> Self {
        self.steps.push(Step::Connect { client: client.into() });
        self
    }

    /// Submit a user intent to a client.
    #[must_use]
    pub fn intent(mut self, client: impl Into<String>, intent: Intent) -> Self {
        self.steps.push(Step::Intent { client: client.into(), intent });
        self
    }

    /// Drop a client's channel out from under it.
    #[must_use]
    pub fn drop_channel(mut self, client: impl Into<String>, reason: impl Into<String>) -> Self {
        self.steps.push(Step::DropChannel { client: client.into(), reason: reason.into() });
        self
    }

    /// Explicitly disconnect a client.
    #[must_use]
    pub fn disconnect(mut self, client: impl Into<String>) -> Self {
        self.steps.push(Step::Disconnect { client: client.into() });
        self
    }

    /// Inject a raw server event, bypassing the scripted server. Useful for
    /// duplicate/reordered delivery scenarios.
    #[must_use]
    pub fn deliver(mut self, client: impl Into<String>, event: ServerEvent) -> Self {
        self.steps.push(Step::Deliver { client: client.into(), event });
        self
    }

    /// Advance virtual time; fires due reconnect timers and an expiry tick.
    #[must_use]
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Advance { duration });
        self
    }

    /// Set the oracle and return a runnable scenario. The oracle is
    /// mandatory: a scenario cannot run without verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle, ready to execute.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the steps, then invoke the oracle on the final world.
    ///
    /// # Errors
    ///
    /// A step that misuses a machine, or an oracle failure, aborts the run
    /// with a message naming the scenario.
    pub fn run(self) -> Result<(), String> {
        let name = self.scenario.name.clone();
        let mut world = World::new(&self.scenario);

        for step in self.scenario.steps.clone() {
            world.apply_step(&name, step)?;
        }

        (self.oracle)(&world)
    }
}

struct ClientHarness {
    client: Client,
    token: String,
    channel_up: bool,
    reconnect_at: Option<Duration>,
    notifications: Vec<Notification>,
}

/// World state: client machines, the scripted server, and virtual time.
pub struct World {
    base: Instant,
    offset: Duration,
    server: ScriptedServer,
    clients: HashMap<String, ClientHarness>,
}

impl World {
    fn new(scenario: &Scenario) -> Self {
        let base = Instant::now();
        let mut server = ScriptedServer::new();
        let mut clients = HashMap::new();

        for (index, name) in scenario.clients.iter().enumerate() {
            let token = format!("token-{name}");
            server.register_token(&token, &format!("u{}", index + 1), name);
            clients.insert(
                name.clone(),
                ClientHarness {
                    client: Client::new(scenario.config.clone()),
                    token,
                    channel_up: false,
                    reconnect_at: None,
                    notifications: Vec::new(),
                },
            );
        }

        Self { base, offset: Duration::ZERO, server, clients }
    }

    /// The scripted server, for oracle inspection.
    #[must_use]
    pub fn server(&self) -> &ScriptedServer {
        &self.server
    }

    /// A client machine by name, for oracle inspection.
    #[must_use]
    pub fn client(&self, name: &str) -> Option<&Client> {
        self.clients.get(name).map(|h| &h.client)
    }

    /// Notifications a client published, in order.
    #[must_use]
    pub fn notifications(&self, name: &str) -> &[Notification] {
        self.clients.get(name).map_or(&[], |h| h.notifications.as_slice())
    }

    fn now(&self) -> Instant {
        self.base + self.offset
    }

    fn apply_step(&mut self, scenario: &str, step: Step) -> Result<(), String> {
        match step {
            Step::Connect { client } => {
                let token = self
                    .clients
                    .get(&client)
                    .ok_or_else(|| format!("{scenario}: unknown client {client}"))?
                    .token
                    .clone();
                let actions = self
                    .clients
                    .get_mut(&client)
                    .ok_or_else(|| format!("{scenario}: unknown client {client}"))?
                    .client
                    .connect(token)
                    .map_err(|e| format!("{scenario}: {client} connect failed: {e}"))?;
                self.run_actions(scenario, &client, actions)
            },
            Step::Intent { client, intent } => {
                self.dispatch(scenario, &client, ClientEvent::Intent(intent))
            },
            Step::DropChannel { client, reason } => {
                if let Some(harness) = self.clients.get_mut(&client) {
                    harness.channel_up = false;
                }
                self.dispatch(scenario, &client, ClientEvent::ChannelClosed { reason })
            },
            Step::Disconnect { client } => {
                let actions = self
                    .clients
                    .get_mut(&client)
                    .ok_or_else(|| format!("{scenario}: unknown client {client}"))?
                    .client
                    .disconnect();
                self.run_actions(scenario, &client, actions)
            },
            Step::Deliver { client, event } => {
                self.dispatch(scenario, &client, ClientEvent::EventReceived(event))
            },
            Step::Advance { duration } => {
                self.offset += duration;

                let names: Vec<String> = self.clients.keys().cloned().collect();
                for name in names {
                    let due = self
                        .clients
                        .get(&name)
                        .is_some_and(|h| h.reconnect_at.is_some_and(|at| at <= self.offset));
                    if due {
                        if let Some(harness) = self.clients.get_mut(&name) {
                            harness.reconnect_at = None;
                        }
                        self.dispatch(scenario, &name, ClientEvent::ReconnectDue)?;
                    }
                    self.dispatch(scenario, &name, ClientEvent::Tick)?;
                }
                Ok(())
            },
        }
    }

    /// Feed one event to one client, then run the resulting action/delivery
    /// cascade to quiescence. A queue keeps per-client arrival order.
    fn dispatch(&mut self, scenario: &str, client: &str, event: ClientEvent) -> Result<(), String> {
        let mut queue = VecDeque::new();
        queue.push_back((client.to_string(), event));
        self.drain(scenario, queue)
    }

    fn run_actions(
        &mut self,
        scenario: &str,
        client: &str,
        actions: Vec<ClientAction>,
    ) -> Result<(), String> {
        let mut queue = VecDeque::new();
        self.execute(scenario, client, actions, &mut queue)?;
        self.drain(scenario, queue)
    }

    fn drain(
        &mut self,
        scenario: &str,
        mut queue: VecDeque<(String, ClientEvent)>,
    ) -> Result<(), String> {
        while let Some((name, event)) = queue.pop_front() {
            tracing::trace!(client = %name, ?event, "dispatching");
            let now = self.now();
            let actions = self
                .clients
                .get_mut(&name)
                .ok_or_else(|| format!("{scenario}: unknown client {name}"))?
                .client
                .handle(event, now)
                .map_err(|e| format!("{scenario}: {name} rejected event: {e}"))?;
            self.execute(scenario, &name, actions, &mut queue)?;
        }
        Ok(())
    }

    fn execute(
        &mut self,
        scenario: &str,
        name: &str,
        actions: Vec<ClientAction>,
        queue: &mut VecDeque<(String, ClientEvent)>,
    ) -> Result<(), String> {
        for action in actions {
            match action {
                ClientAction::OpenChannel => {
                    if let Some(harness) = self.clients.get_mut(name) {
                        harness.channel_up = true;
                    }
                    queue.push_back((name.to_string(), ClientEvent::ChannelOpened));
                },
                ClientAction::CloseChannel => {
                    if let Some(harness) = self.clients.get_mut(name) {
                        harness.channel_up = false;
                    }
                },
                ClientAction::Send(command) => {
                    for (target, event) in self.server.process(name, &command) {
                        let up = self
                            .clients
                            .get(&target)
                            .ok_or_else(|| format!("{scenario}: delivery to unknown {target}"))?
                            .channel_up;
                        if up {
                            queue.push_back((target, ClientEvent::EventReceived(event)));
                        }
                    }
                },
                ClientAction::ScheduleReconnect { delay } => {
                    if let Some(harness) = self.clients.get_mut(name) {
                        harness.reconnect_at = Some(self.offset + delay);
                    }
                },
                ClientAction::Publish(notification) => {
                    if let Some(harness) = self.clients.get_mut(name) {
                        harness.notifications.push(notification);
                    }
                },
            }
        }
        Ok(())
    }
}
