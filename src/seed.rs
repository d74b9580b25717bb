//! Startup data for the in-memory store.
//!
//! A seed file is JSON with two optional arrays:
//!
//! ```json
//! { "coupons": [ { "code": "WELCOME", ... } ], "customers": [ { "id": "...", ... } ] }
//! ```
//!
//! Coupons go through the same validation as `POST /api/v1/coupons`.

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::models::CustomerProfile;
use crate::repositories::CustomerDirectory;
use crate::services::coupons::{CouponService, CreateCouponInput};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default)]
    pub coupons: Vec<CreateCouponInput>,
    #[serde(default)]
    pub customers: Vec<CustomerProfile>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub coupons: usize,
    pub customers: usize,
    pub skipped: usize,
}

impl SeedData {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServiceError::InternalError(format!("cannot read seed file {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads everything it can; a coupon that fails validation or already
    /// exists is logged and skipped.
    pub async fn apply(
        self,
        coupons: &CouponService,
        customers: &dyn CustomerDirectory,
    ) -> Result<SeedReport, ServiceError> {
        let mut report = SeedReport::default();

        for profile in self.customers {
            customers.upsert_profile(profile).await?;
            report.customers += 1;
        }

        for input in self.coupons {
            let code = input.code.clone();
            match coupons.create_coupon(input).await {
                Ok(_) => report.coupons += 1,
                Err(e @ (ServiceError::ValidationError(_) | ServiceError::Conflict(_))) => {
                    warn!(%code, error = %e, "skipping seed coupon");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            coupons = report.coupons,
            customers = report.customers,
            skipped = report.skipped,
            "seed data loaded"
        );
        Ok(report)
    }
}
