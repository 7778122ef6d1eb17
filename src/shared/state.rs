use std::sync::Arc;

use crate::billing::stripe_integration::StripeClient;
use crate::config::AppConfig;
use crate::shared::utils::DbPool;
use crate::store::BookingStore;

pub struct AppState {
    pub conn: DbPool,
    pub store: Arc<dyn BookingStore>,
    pub stripe: StripeClient,
    pub config: AppConfig,
}
