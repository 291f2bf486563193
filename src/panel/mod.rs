//! The admin panel's data layer, wired from configuration.
//!
//! One [`AdminPanel`] owns the shared cache, the mutation runner with its
//! observers, and a [`ManagedCollection`] per managed table. Screens borrow
//! collections from it; nothing here is global.

use std::sync::Arc;

use tracing::{info, warn};

use crate::activity::ActivityLogger;
use crate::backend::{Auth, Backend, ChangeFeed, Filter, Order, Query};
use crate::cache::{CollectionKey, QueryCache};
use crate::collection::ManagedCollection;
use crate::config::SyncConfig;
use crate::entities::{
    AdminUser, Faq, Product, Project, Service, SpecialService, SystemSetting, WebApplication,
    WebsiteProject,
};
use crate::mutation::MutationRunner;
use crate::notify::{Notifier, NotifyObserver};
use crate::realtime::{self, ContactCounter, RealtimeError, Subscription};
use crate::record::Record;

/// Key of the read-only list the public site shows for `table`.
pub fn public_key(table: &str) -> CollectionKey {
    CollectionKey::of(table).child("public")
}

pub struct AdminPanel {
    config: SyncConfig,
    backend: Arc<dyn Backend>,
    runner: MutationRunner,
    pub projects: ManagedCollection<Project>,
    pub web_applications: ManagedCollection<WebApplication>,
    pub website_projects: ManagedCollection<WebsiteProject>,
    pub products: ManagedCollection<Product>,
    pub services: ManagedCollection<Service>,
    pub special_services: ManagedCollection<SpecialService>,
    pub faqs: ManagedCollection<Faq>,
    pub settings: ManagedCollection<SystemSetting>,
    pub users: ManagedCollection<AdminUser>,
}

/// Builder for [`AdminPanel`].
pub struct AdminPanelBuilder {
    config: SyncConfig,
    backend: Arc<dyn Backend>,
    notifier: Option<Arc<dyn Notifier>>,
    auth: Option<Arc<dyn Auth>>,
    activity_log: bool,
}

impl AdminPanelBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Attribute activity log entries to the signed-in admin.
    pub fn auth(mut self, auth: Arc<dyn Auth>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn activity_log(mut self, enabled: bool) -> Self {
        self.activity_log = enabled;
        self
    }

    pub fn build(self) -> AdminPanel {
        let cache = QueryCache::from_config(&self.config.cache);
        let mut runner = MutationRunner::new(cache);
        if let Some(notifier) = self.notifier {
            runner = runner.with_observer(Arc::new(NotifyObserver::new(
                notifier,
                self.config.notifications.clone(),
            )));
        }
        if self.activity_log {
            let mut logger = ActivityLogger::new(Arc::clone(&self.backend));
            if let Some(auth) = self.auth {
                logger = logger.with_auth(auth);
            }
            runner = runner.with_observer(Arc::new(logger));
        }

        let backend = self.backend;
        let projects = collection::<Project>(&backend, &runner)
            .with_label("Project")
            .invalidating(public_key(Project::TABLE));
        let web_applications = collection::<WebApplication>(&backend, &runner)
            .with_label("Web application")
            .invalidating(public_key(WebApplication::TABLE));
        let website_projects = collection::<WebsiteProject>(&backend, &runner)
            .with_label("Website project")
            .invalidating(public_key(WebsiteProject::TABLE));
        let products = collection::<Product>(&backend, &runner)
            .with_label("Product")
            .invalidating(public_key(Product::TABLE));
        let services = collection::<Service>(&backend, &runner)
            .with_query(Query::all().order(Order::asc("sort_order")))
            .with_label("Service")
            .invalidating(public_key(Service::TABLE));
        let special_services = collection::<SpecialService>(&backend, &runner)
            .with_label("Special service")
            .invalidating(public_key(SpecialService::TABLE));
        let faqs = collection::<Faq>(&backend, &runner)
            .with_query(Query::all().order(Order::asc("sort_order")))
            .with_label("FAQ")
            .invalidating(public_key(Faq::TABLE));
        let settings = collection::<SystemSetting>(&backend, &runner)
            .with_query(Query::all().order(Order::asc("key")))
            .with_label("Setting");
        let users = collection::<AdminUser>(&backend, &runner).with_label("User");

        AdminPanel {
            config: self.config,
            backend,
            runner,
            projects,
            web_applications,
            website_projects,
            products,
            services,
            special_services,
            faqs,
            settings,
            users,
        }
    }
}

impl AdminPanel {
    pub fn builder(config: SyncConfig, backend: Arc<dyn Backend>) -> AdminPanelBuilder {
        AdminPanelBuilder {
            config,
            backend,
            notifier: None,
            auth: None,
            activity_log: true,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        self.runner.cache()
    }

    pub fn runner(&self) -> &MutationRunner {
        &self.runner
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Read-only list of `R` as the public site shows it.
    ///
    /// Shares the cache with the admin collection and is refreshed after
    /// every admin mutation of the same table.
    pub fn public<R: Record>(&self) -> ManagedCollection<R> {
        ManagedCollection::new(Arc::clone(&self.backend), self.runner.clone())
            .with_key(public_key(R::TABLE))
            .with_query(public_query(R::TABLE))
    }

    /// Keep every admin collection current from `feed`.
    ///
    /// Tables whose channel cannot be opened fall back to polling when a
    /// poll interval is configured. Returns nothing when realtime is disabled.
    pub fn enable_realtime(&self, feed: &dyn ChangeFeed) -> Vec<Subscription> {
        if !self.config.realtime.enabled {
            info!("realtime disabled by configuration");
            return Vec::new();
        }
        let watched: [(&str, &CollectionKey); 9] = [
            (Project::TABLE, self.projects.key()),
            (WebApplication::TABLE, self.web_applications.key()),
            (WebsiteProject::TABLE, self.website_projects.key()),
            (Product::TABLE, self.products.key()),
            (Service::TABLE, self.services.key()),
            (SpecialService::TABLE, self.special_services.key()),
            (Faq::TABLE, self.faqs.key()),
            (SystemSetting::TABLE, self.settings.key()),
            (AdminUser::TABLE, self.users.key()),
        ];

        let mut subscriptions = Vec::new();
        let mut unwatched = Vec::new();
        for (table, key) in watched {
            let keys = vec![key.clone(), public_key(table)];
            match realtime::watch_table(feed, table, self.cache().clone(), keys.clone()) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(err) => {
                    warn!(table, error = %err, "realtime unavailable");
                    unwatched.extend(keys);
                }
            }
        }

        if !unwatched.is_empty() {
            match self.config.realtime.poll_interval() {
                Some(interval) => {
                    match realtime::poll_every(self.cache().clone(), unwatched, interval) {
                        Ok(subscription) => subscriptions.push(subscription),
                        Err(err) => warn!(error = %err, "polling fallback unavailable"),
                    }
                }
                None => warn!("no poll interval configured, some tables will not refresh"),
            }
        }
        subscriptions
    }

    pub async fn contact_counter(
        &self,
        feed: &dyn ChangeFeed,
    ) -> Result<ContactCounter, RealtimeError> {
        ContactCounter::start(Arc::clone(&self.backend), feed).await
    }

    /// Stop listeners and drop every cached list.
    pub async fn shutdown(&self, subscriptions: Vec<Subscription>) {
        for subscription in subscriptions {
            subscription.dispose().await;
        }
        self.cache().clear();
        info!("admin panel shut down");
    }
}

fn collection<R: Record>(backend: &Arc<dyn Backend>, runner: &MutationRunner) -> ManagedCollection<R> {
    ManagedCollection::new(Arc::clone(backend), runner.clone())
}

fn public_query(table: &str) -> Query {
    let newest = Query::all().order(Order::desc("created_at"));
    match table {
        "projects" | "website_projects" => newest,
        "services" => Query::all()
            .filter(Filter::eq("is_active", true))
            .order(Order::asc("sort_order")),
        "faqs" => Query::all()
            .filter(Filter::eq("is_published", true))
            .order(Order::asc("sort_order")),
        "web_applications" | "products" | "special_services" => {
            newest.filter(Filter::eq("is_active", true))
        }
        _ => newest,
    }
}
