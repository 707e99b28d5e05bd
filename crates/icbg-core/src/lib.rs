//! Dispatch engine composing geodata, pairing, notification and order services.
//!
//! The HTTP surface talks only to the engine. Admission limits are checked
//! here before any remote call or write.

use icbg_agent::{AgentError, AgentInterface, AgentService};
use icbg_config::Config;
use icbg_geodata::{GeodataError, GeodataService};
use icbg_notify::implementations::agent_mail::AgentMailer;
use icbg_notify::NotificationService;
use icbg_order::{OrderError, OrderService, OrderSettings};
use icbg_pairing::{Catalog, PairingService};
use icbg_storage::{StorageError, StorageInterface, StorageService};
use icbg_types::{
	AddressIdentifyRequest, AddressIdentifyResponse, BoundingBox, ConfirmOrdersRequest,
	ConfirmOrdersResponse, GiftPairRequest, GiftPairResponse, NotificationStatus,
	SendNotificationsRequest, SendNotificationsResponse, OSM_ATTRIBUTION,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod admission;
mod error;

pub use admission::{Admission, AdmissionError};
pub use error::CoreError;

type StorageFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send>;
type AgentFactory = Box<dyn Fn(&toml::Value) -> Result<Box<dyn AgentInterface>, AgentError> + Send>;

pub struct DispatchEngine {
	config: Config,
	admission: Admission,
	geodata: Arc<GeodataService>,
	pairing: Arc<PairingService>,
	notify: Arc<NotificationService>,
	orders: Arc<OrderService>,
}

impl DispatchEngine {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn admission(&self) -> &Admission {
		&self.admission
	}

	pub fn catalog(&self) -> &Catalog {
		self.pairing.catalog()
	}

	/// Batch, order, and selection operations.
	pub fn orders(&self) -> &OrderService {
		&self.orders
	}

	/// Resolves a drawn polygon into deliverable addresses and records the
	/// selection.
	pub async fn identify_addresses(
		&self,
		request: &AddressIdentifyRequest,
	) -> Result<AddressIdentifyResponse, CoreError> {
		let area_km2 = self.admission.check_area(&request.polygon)?;
		let limit = self.admission.address_limit(request.limit);
		info!(area_km2, limit, "Identifying addresses in polygon");

		let addresses = self
			.geodata
			.identify_addresses_in_polygon(&request.polygon, limit)
			.await?;
		let bounding_box = BoundingBox::of_polygon(&request.polygon)
			.ok_or_else(|| GeodataError::InvalidPolygon("polygon has no positions".to_string()))?;

		let selection = self
			.orders
			.create_selection(
				&request.polygon,
				bounding_box,
				addresses.len(),
				request.location_description.clone(),
			)
			.await?;

		Ok(AddressIdentifyResponse {
			count: addresses.len(),
			addresses,
			bounding_box,
			attribution: OSM_ATTRIBUTION.to_string(),
			selection_id: selection.selection_id,
		})
	}

	/// Pairs every address with one product, using the configured default
	/// strategy when the request names none.
	pub async fn pair_gifts(&self, request: &GiftPairRequest) -> Result<GiftPairResponse, CoreError> {
		self.admission.check_addresses(&request.addresses)?;
		let strategy = request
			.strategy
			.unwrap_or(self.config.pairing.default_strategy);

		let result = self
			.pairing
			.pair(&request.addresses, strategy, request.category.as_deref())
			.await;

		Ok(GiftPairResponse {
			total_cost: result.total_cost(),
			strategy_used: result.strategy_used.to_string(),
			pairings: result.pairings,
		})
	}

	/// Sends delivery notifications.
	///
	/// With a batch id, the batch must exist and its orders addressed to a
	/// successfully notified email are flagged afterwards.
	pub async fn send_notifications(
		&self,
		request: SendNotificationsRequest,
	) -> Result<SendNotificationsResponse, CoreError> {
		self.admission.check_recipients(&request.recipients)?;
		if let Some(batch_id) = &request.batch_id {
			if self.orders.get_batch(batch_id).await?.is_none() {
				return Err(OrderError::BatchNotFound(batch_id.clone()).into());
			}
		}

		let estimated_delivery = request
			.estimated_delivery
			.filter(|text| !text.trim().is_empty())
			.unwrap_or_else(|| self.config.orders.default_estimated_delivery.clone());
		let response = self
			.notify
			.send(request.recipients, &estimated_delivery)
			.await;

		if let Some(batch_id) = request.batch_id {
			let sent: Vec<String> = response
				.results
				.iter()
				.filter(|r| r.status == NotificationStatus::Sent)
				.map(|r| r.email.clone())
				.collect();
			if !sent.is_empty() {
				// The emails are already out; report them even if flagging fails.
				if let Err(e) = self.orders.mark_emails_sent(&batch_id, &sent).await {
					warn!(batch_id = %batch_id, error = %e, "Failed to flag notified orders");
				}
			}
		}

		Ok(response)
	}

	/// Turns a pairing run into a batch of orders.
	pub async fn confirm_orders(
		&self,
		request: &ConfirmOrdersRequest,
	) -> Result<ConfirmOrdersResponse, CoreError> {
		Ok(self.orders.confirm(request).await?)
	}
}

/// Builds a [`DispatchEngine`] from configuration.
///
/// Storage and agent backends are looked up by name in their crate's
/// registry unless a factory override is supplied.
pub struct EngineBuilder {
	config: Config,
	storage_factory: Option<StorageFactory>,
	agent_factory: Option<AgentFactory>,
	catalog: Option<Catalog>,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factory: None,
			agent_factory: None,
			catalog: None,
		}
	}

	pub fn with_storage_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send + 'static,
	{
		self.storage_factory = Some(Box::new(factory));
		self
	}

	pub fn with_agent_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn AgentInterface>, AgentError> + Send + 'static,
	{
		self.agent_factory = Some(Box::new(factory));
		self
	}

	/// Uses `catalog` instead of loading one from `pairing.catalog_path`.
	pub fn with_catalog(mut self, catalog: Catalog) -> Self {
		self.catalog = Some(catalog);
		self
	}

	pub async fn build(self) -> Result<DispatchEngine, CoreError> {
		let config = self.config;

		let storage_backend = match &self.storage_factory {
			Some(factory) => factory(&config.storage.config),
			None => icbg_storage::create_storage(&config.storage.backend, &config.storage.config),
		}
		.map_err(|e| CoreError::Config(format!("storage: {}", e)))?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let agent_backend = match &self.agent_factory {
			Some(factory) => factory(&config.agent.config),
			None => icbg_agent::create_agent(&config.agent.implementation, &config.agent.config),
		}
		.map_err(|e| CoreError::Config(format!("agent: {}", e)))?;
		let agent = Arc::new(AgentService::new(agent_backend));

		let geodata = GeodataService::from_urls(
			&config.geodata.endpoints(),
			Duration::from_secs(config.geodata.request_timeout_secs),
			config.geodata.query_timeout_secs,
			config.geodata.household_seed,
		)?;

		let catalog = match self.catalog {
			Some(catalog) => catalog,
			None => Catalog::load(config.pairing.catalog_path.as_deref()).await?,
		};
		let pairing = PairingService::new(
			Arc::new(catalog),
			agent.clone(),
			config.pairing.model.clone(),
			config.pairing.tool_servers.clone(),
		);

		let mailer = AgentMailer::new(
			agent,
			config.notify.model.clone(),
			config.notify.tool_servers.clone(),
		);
		let notify = NotificationService::new(Box::new(mailer))?;

		let orders = OrderService::new(
			storage,
			OrderSettings {
				shipping_cost: config.orders.shipping_cost,
				delivery_start_days: config.orders.delivery_start_days,
				delivery_end_days: config.orders.delivery_end_days,
			},
		);

		info!(
			storage = %config.storage.backend,
			agent = %config.agent.implementation,
			products = pairing.catalog().len(),
			endpoints = config.geodata.endpoints().len(),
			"Dispatch engine ready"
		);

		Ok(DispatchEngine {
			admission: Admission::new(config.admission.clone()),
			geodata: Arc::new(geodata),
			pairing: Arc::new(pairing),
			notify: Arc::new(notify),
			orders: Arc::new(orders),
			config,
		})
	}
}
