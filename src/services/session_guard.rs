use std::sync::{Arc, Mutex};

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};

use crate::{
    models::auth::{AuthEvent, AuthEventKind},
    services::{auth::SessionProvider, contacts::ContactStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Dashboard,
}

impl View {
    pub fn path(&self) -> &'static str {
        match self {
            View::Landing => "/",
            View::Dashboard => "/dashboard",
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, view: View);
}

/// Navigator that records every requested view.
#[derive(Default)]
pub struct NavigationLog {
    history: Mutex<Vec<View>>,
}

impl NavigationLog {
    pub fn last(&self) -> Option<View> {
        self.history().last().copied()
    }

    pub fn history(&self) -> Vec<View> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, view: View) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(view);
    }
}

/// Session-change listener owned by a mounted view; dropping it deregisters the listener.
pub struct ViewSubscription {
    listener: JoinHandle<()>,
}

impl ViewSubscription {
    pub fn is_active(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub enum DashboardMount {
    Redirected,
    Ready {
        email: String,
        whatsapp: Option<String>,
        subscription: ViewSubscription,
    },
}

/// Gate the dashboard on an active session and load the number on file.
pub async fn mount_dashboard(
    provider: &dyn SessionProvider,
    store: &dyn ContactStore,
    navigator: Arc<dyn Navigator>,
) -> DashboardMount {
    let Some(session) = provider.current_session().await else {
        navigator.navigate(View::Landing);
        return DashboardMount::Redirected;
    };

    // Subscribe before the lookup so a sign-out during it is still seen.
    let events = provider.subscribe();

    let whatsapp = match store.find_whatsapp(&session.email).await {
        Ok(number) => number,
        Err(e) => {
            tracing::error!("Error fetching user data: {e}");
            None
        }
    };

    let subscription = listen(events, navigator, |event| {
        (event.kind == AuthEventKind::SignedOut || event.session.is_none())
            .then_some(View::Landing)
    });

    DashboardMount::Ready {
        email: session.email,
        whatsapp,
        subscription,
    }
}

/// Send signed-in visitors on to the dashboard, now or on their next sign-in.
pub async fn mount_landing(
    provider: &dyn SessionProvider,
    navigator: Arc<dyn Navigator>,
) -> ViewSubscription {
    let events = provider.subscribe();

    if provider.current_session().await.is_some() {
        navigator.navigate(View::Dashboard);
    }

    listen(events, navigator, |event| {
        (event.kind == AuthEventKind::SignedIn && event.session.is_some())
            .then_some(View::Dashboard)
    })
}

fn listen(
    events: broadcast::Receiver<AuthEvent>,
    navigator: Arc<dyn Navigator>,
    route: fn(&AuthEvent) -> Option<View>,
) -> ViewSubscription {
    let listener = tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let Some(view) = route(&event) {
                        navigator.navigate(view);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("Session listener lagged, skipped {skipped} events");
                }
            }
        }
    });
    ViewSubscription { listener }
}
