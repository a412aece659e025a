//! Configuration types for the registry client.

/// Configuration for the ECR registry client.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// AWS region override. `None` uses the SDK's default provider chain.
    pub region: Option<String>,

    /// Page size requested from listing calls that accept one.
    ///
    /// `None` leaves the service default in place.
    pub page_size: Option<i32>,

    /// Registry (account) id to query. `None` targets the caller's registry.
    pub registry_id: Option<String>,
}

impl RegistryConfig {
    /// Creates a configuration that relies entirely on SDK defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecr_exporter_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new();
    /// assert!(config.region.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AWS region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the listing page size.
    ///
    /// ECR accepts 1..=1000; values outside that range are clamped.
    #[must_use]
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size.clamp(1, 1000));
        self
    }

    /// Sets the registry id.
    #[must_use]
    pub fn with_registry_id(mut self, registry_id: impl Into<String>) -> Self {
        self.registry_id = Some(registry_id.into());
        self
    }
}
