use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

const BUILTIN_KEYS: [&str; 4] = ["user", "theme", "sidebarCollapsed", "currentPage"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(anyhow!("invalid theme value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Builtins {
    user: Option<UserRef>,
    theme: Theme,
    sidebar_collapsed: bool,
    current_page: Option<String>,
}

/// Owned copy of everything the store holds. Slice states are carried as
/// JSON values since the store does not know their shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub user: Option<UserRef>,
    pub theme: Theme,
    pub sidebar_collapsed: bool,
    pub current_page: Option<String>,
    #[serde(flatten)]
    pub slices: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Subscriber = dyn Fn(&StoreState, &str) -> anyhow::Result<()> + Send + Sync;

/// Named action of a slice reducer. The name becomes the second half of
/// the `"<slice>.<action>"` source tag.
pub trait SliceAction {
    fn name(&self) -> &'static str;
}

/// A feature slice: its state shape and the pure reducer over its actions.
pub trait Slice: 'static {
    type State: Clone + Default + Serialize + Send + 'static;
    type Action: SliceAction;

    fn reduce(state: &Self::State, action: Self::Action) -> Self::State;
}

trait ErasedSlice: Send {
    fn snapshot(&self) -> anyhow::Result<Value>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct SliceCell<S: Slice> {
    state: S::State,
    _reducer: PhantomData<fn() -> S>,
}

impl<S: Slice> ErasedSlice for SliceCell<S> {
    fn snapshot(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(&self.state)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct CoreState {
    builtins: Builtins,
    slices: BTreeMap<String, Box<dyn ErasedSlice>>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: BTreeMap<u64, Arc<Subscriber>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<CoreState>,
    subscribers: Mutex<Subscribers>,
}

/// Shell-level state container. Clones share the same state; no lock is
/// held while subscribers run, so callbacks may call back into the store.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Inner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slices: Vec<String> = self.inner.state.lock().slices.keys().cloned().collect();
        f.debug_struct("Store")
            .field("slices", &slices)
            .field("subscribers", &self.inner.subscribers.lock().entries.len())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        debug!("created store");
        Self::default()
    }

    /// Drops every subscriber. State stays readable.
    #[instrument(skip(self))]
    pub fn dispose(&self) {
        let mut subscribers = self.inner.subscribers.lock();
        let dropped = subscribers.entries.len();
        subscribers.entries.clear();
        info!(dropped, "store disposed");
    }

    pub fn get_state(&self) -> StoreState {
        let state = self.inner.state.lock();
        let slices = state
            .slices
            .iter()
            .map(|(name, slice)| {
                let value = slice.snapshot().unwrap_or_else(|err| {
                    warn!(slice = %name, error = %err, "failed to snapshot slice");
                    Value::Null
                });
                (name.clone(), value)
            })
            .collect();

        StoreState {
            user: state.builtins.user.clone(),
            theme: state.builtins.theme,
            sidebar_collapsed: state.builtins.sidebar_collapsed,
            current_page: state.builtins.current_page.clone(),
            slices,
        }
    }

    /// Keyed lookup: a slice name, a `slice.path` into a slice, or a
    /// built-in field. Anything else is `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let snapshot = self.get_state();

        if let Some(value) = snapshot.slices.get(key) {
            return Some(value.clone());
        }

        if let Some((slice, path)) = key.split_once('.') {
            let root = snapshot.slices.get(slice)?;
            return lookup_path(root, path).cloned();
        }

        if !BUILTIN_KEYS.contains(&key) {
            trace!(key, "unknown state key");
            return None;
        }
        let mut builtins = serde_json::to_value(&snapshot).ok()?;
        builtins.get_mut(key).map(Value::take)
    }

    #[instrument(skip_all, fields(email = ?user.as_ref().and_then(|u| u.email.as_deref())))]
    pub fn set_user(&self, user: Option<UserRef>) {
        self.inner.state.lock().builtins.user = user;
        self.notify("setUser");
    }

    /// Accepts only `dark` and `light`; anything else is logged and ignored.
    #[instrument(skip(self))]
    pub fn set_theme(&self, theme: &str) -> bool {
        match theme.parse::<Theme>() {
            Ok(theme) => {
                self.set_theme_mode(theme);
                true
            }
            Err(err) => {
                warn!(theme, error = %err, "rejected theme change");
                false
            }
        }
    }

    pub fn set_theme_mode(&self, theme: Theme) {
        debug!(theme = theme.as_str(), "set theme");
        self.inner.state.lock().builtins.theme = theme;
        self.notify("setTheme");
    }

    #[instrument(skip(self))]
    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.inner.state.lock().builtins.sidebar_collapsed = collapsed;
        self.notify("setSidebarCollapsed");
    }

    #[instrument(skip(self))]
    pub fn set_current_page(&self, page: Option<String>) {
        self.inner.state.lock().builtins.current_page = page;
        self.notify("setCurrentPage");
    }

    /// Restores built-in fields. Slices keep their state.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        self.inner.state.lock().builtins = Builtins::default();
        info!("store reset");
        self.notify("reset");
    }

    /// Registers `name` with `initial` state. A second registration under
    /// the same name with the same reducer returns a handle to the existing
    /// slice and leaves its state untouched.
    #[instrument(skip(self, initial))]
    pub fn register_slice<S: Slice>(
        &self,
        name: &str,
        initial: S::State,
    ) -> anyhow::Result<SliceHandle<S>> {
        if name.is_empty() || name.contains('.') {
            bail!("invalid slice name: {name:?}");
        }
        if BUILTIN_KEYS.contains(&name) {
            bail!("slice name {name} shadows a built-in field");
        }

        let mut state = self.inner.state.lock();
        if let Some(existing) = state.slices.get(name) {
            if !existing.as_any().is::<SliceCell<S>>() {
                bail!("slice {name} is already registered with a different reducer");
            }
            warn!(slice = name, "slice already registered, returning existing");
        } else {
            state.slices.insert(
                name.to_string(),
                Box::new(SliceCell::<S> {
                    state: initial,
                    _reducer: PhantomData,
                }),
            );
            debug!(slice = name, "registered slice");
        }

        Ok(SliceHandle {
            store: self.clone(),
            name: Arc::from(name),
            _reducer: PhantomData,
        })
    }

    /// Registers a callback run after every state change. An `Err` return or
    /// a panic is logged and the remaining subscribers still run.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StoreState, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.next_id += 1;
        let id = subscribers.next_id;
        subscribers.entries.insert(id, Arc::new(callback));
        debug!(id, "subscriber added");
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.subscribers.lock().entries.remove(&id.0).is_some();
        if removed {
            debug!(id = id.0, "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().entries.len()
    }

    /// Calls every subscriber registered when the pass starts, in
    /// registration order, with one snapshot of the state.
    fn notify(&self, source: &str) {
        let snapshot = self.get_state();
        let pass: Vec<(u64, Arc<Subscriber>)> = self
            .inner
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        trace!(source, subscribers = pass.len(), "notifying subscribers");
        for (id, callback) in pass {
            if !self.inner.subscribers.lock().entries.contains_key(&id) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot, source))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(id, source, error = %err, "subscriber error"),
                Err(payload) => warn!(id, source, panic = panic_message(&*payload), "subscriber panicked"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Capability over one registered slice: read a copy, dispatch an action.
pub struct SliceHandle<S: Slice> {
    store: Store,
    name: Arc<str>,
    _reducer: PhantomData<fn() -> S>,
}

impl<S: Slice> Clone for SliceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: Arc::clone(&self.name),
            _reducer: PhantomData,
        }
    }
}

impl<S: Slice> fmt::Debug for SliceHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceHandle").field("name", &self.name).finish()
    }
}

impl<S: Slice> SliceHandle<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> S::State {
        let state = self.store.inner.state.lock();
        match state
            .slices
            .get(self.name.as_ref())
            .and_then(|slice| slice.as_any().downcast_ref::<SliceCell<S>>())
        {
            Some(cell) => cell.state.clone(),
            None => {
                warn!(slice = %self.name, "slice missing, returning default state");
                S::State::default()
            }
        }
    }

    /// Runs the reducer, swaps in the new state, then notifies subscribers
    /// with `"<slice>.<action>"`.
    pub fn dispatch(&self, action: S::Action) {
        let source = format!("{}.{}", self.name, action.name());
        {
            let mut state = self.store.inner.state.lock();
            let Some(cell) = state
                .slices
                .get_mut(self.name.as_ref())
                .and_then(|slice| slice.as_any_mut().downcast_mut::<SliceCell<S>>())
            else {
                warn!(source = %source, "dispatch to missing slice ignored");
                return;
            };
            cell.state = S::reduce(&cell.state, action);
        }
        debug!(source = %source, "slice updated");
        self.store.notify(&source);
    }
}

fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}
