//! Credential Resolver
//!
//! Decides, per tenant and channel, which provider client to use:
//!
//! 1. A fresh cache entry wins; the returned [`ChannelConfig`] is still
//!    derived from the current tenant row so edits show up immediately.
//! 2. A tenant asking for its own provider gets a custom client when every
//!    required field is present and decrypts.
//! 3. An incomplete or unbuildable custom setup falls back to the system
//!    provider if the tenant allows it, otherwise resolution fails with a
//!    configuration error and nothing is sent.
//! 4. No system credentials at all yields no client; senders simulate.

use recall_core::{
    Channel, Clock, EmailProviderSetting, MessagingProvider, SmsProviderSetting, Tenant, TenantId,
};
use recall_store::TenantRepository;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cache::ClientCache;
use crate::config::MessagingConfig;
use crate::crypto::{
    validate_email, validate_phone_number, validate_sendgrid_api_key,
    validate_twilio_account_sid, validate_twilio_auth_token, CredentialCipher,
};
use crate::error::{MessagingError, MessagingResult};
use crate::factory::ClientFactory;
use crate::metrics;
use crate::provider::{EmailClient, SendGridCredentials, SmsClient, TwilioCredentials};

/// Metadata describing the provider a channel resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel: Channel,
    /// Provider whose client is in use
    pub provider: MessagingProvider,
    /// Provider the tenant asked for
    pub requested_provider: MessagingProvider,
    pub fallback_enabled: bool,
    /// From number or from address
    pub sender: Option<String>,
    pub sender_name: Option<String>,
}

impl ChannelConfig {
    pub fn used_fallback(&self) -> bool {
        self.requested_provider.is_custom() && !self.provider.is_custom()
    }
}

/// A resolved client plus its metadata; `client` is `None` when no provider
/// is configured anywhere
pub struct Resolved<C: ?Sized> {
    pub client: Option<Arc<C>>,
    pub config: ChannelConfig,
}

/// Client variants for channel-generic callers
#[derive(Clone)]
pub enum ChannelClient {
    Sms(Arc<dyn SmsClient>),
    Email(Arc<dyn EmailClient>),
}

/// Channel-generic resolution result
pub struct ResolvedChannel {
    pub client: Option<ChannelClient>,
    pub config: ChannelConfig,
}

struct CachedClient<C: ?Sized> {
    client: Option<Arc<C>>,
    provider: MessagingProvider,
}

impl<C: ?Sized> Clone for CachedClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            provider: self.provider,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Per-tenant provider resolution with caching
pub struct CredentialResolver {
    tenants: Arc<dyn TenantRepository>,
    factory: Arc<dyn ClientFactory>,
    config: Arc<MessagingConfig>,
    cipher: Option<CredentialCipher>,
    sms_cache: ClientCache<CachedClient<dyn SmsClient>>,
    email_cache: ClientCache<CachedClient<dyn EmailClient>>,
}

impl CredentialResolver {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        factory: Arc<dyn ClientFactory>,
        config: Arc<MessagingConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cipher = config
            .encryption_key
            .as_deref()
            .map(CredentialCipher::from_config_key);
        Self {
            tenants,
            factory,
            sms_cache: ClientCache::new(config.cache_ttl_secs, clock.clone()),
            email_cache: ClientCache::new(config.cache_ttl_secs, clock),
            cipher,
            config,
        }
    }

    /// Drop cached clients of one tenant after a settings change
    pub fn invalidate(&self, tenant_id: &TenantId) {
        let sms = self.sms_cache.invalidate(tenant_id);
        let email = self.email_cache.invalidate(tenant_id);
        debug!(tenant_id = %tenant_id, sms = sms, email = email, "Messaging cache invalidated");
    }

    pub fn invalidate_all(&self) {
        self.sms_cache.invalidate_all();
        self.email_cache.invalidate_all();
    }

    /// Resolve either channel
    pub async fn resolve_channel(
        &self,
        tenant_id: &TenantId,
        channel: Channel,
    ) -> MessagingResult<ResolvedChannel> {
        match channel {
            Channel::Sms => {
                let resolved = self.resolve_sms(tenant_id).await?;
                Ok(ResolvedChannel {
                    client: resolved.client.map(ChannelClient::Sms),
                    config: resolved.config,
                })
            }
            Channel::Email => {
                let resolved = self.resolve_email(tenant_id).await?;
                Ok(ResolvedChannel {
                    client: resolved.client.map(ChannelClient::Email),
                    config: resolved.config,
                })
            }
        }
    }

    pub async fn resolve_sms(&self, tenant_id: &TenantId) -> MessagingResult<Resolved<dyn SmsClient>> {
        let tenant = self.load_tenant(tenant_id).await?;

        let cached = match self.sms_cache.get(tenant_id) {
            Some(cached) => {
                metrics::record_cache_lookup(Channel::Sms, true);
                cached
            }
            None => {
                metrics::record_cache_lookup(Channel::Sms, false);
                let built = self.build_sms(&tenant)?;
                self.sms_cache.insert(tenant_id.clone(), built.clone());
                built
            }
        };

        Ok(Resolved {
            config: self.sms_config(&tenant, cached.provider),
            client: cached.client,
        })
    }

    pub async fn resolve_email(
        &self,
        tenant_id: &TenantId,
    ) -> MessagingResult<Resolved<dyn EmailClient>> {
        let tenant = self.load_tenant(tenant_id).await?;

        let cached = match self.email_cache.get(tenant_id) {
            Some(cached) => {
                metrics::record_cache_lookup(Channel::Email, true);
                cached
            }
            None => {
                metrics::record_cache_lookup(Channel::Email, false);
                let built = self.build_email(&tenant)?;
                self.email_cache.insert(tenant_id.clone(), built.clone());
                built
            }
        };

        Ok(Resolved {
            config: self.email_config(&tenant, cached.provider),
            client: cached.client,
        })
    }

    async fn load_tenant(&self, tenant_id: &TenantId) -> MessagingResult<Tenant> {
        self.tenants
            .get(tenant_id)
            .await?
            .ok_or_else(|| MessagingError::TenantNotFound(tenant_id.to_string()))
    }

    fn decrypt(&self, provider: MessagingProvider, sealed: &str) -> MessagingResult<Zeroizing<String>> {
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            MessagingError::configuration(provider, "credential encryption key not configured")
        })?;
        cipher
            .decrypt(sealed)
            .map_err(|e| MessagingError::configuration(provider, e.to_string()))
    }

    // ========================================================================
    // SMS
    // ========================================================================

    fn build_sms(&self, tenant: &Tenant) -> MessagingResult<CachedClient<dyn SmsClient>> {
        let settings = &tenant.messaging;
        match settings.sms_provider {
            SmsProviderSetting::System => self.system_sms(),
            SmsProviderSetting::CustomTwilio => match self.custom_sms(tenant) {
                Ok(client) => Ok(CachedClient {
                    client: Some(client),
                    provider: MessagingProvider::CustomTwilio,
                }),
                Err(e) if settings.sms_fallback_to_system => {
                    warn!(
                        tenant_id = %tenant.tenant_id,
                        channel = "sms",
                        error = %e,
                        "Custom Twilio unavailable, falling back to system provider"
                    );
                    metrics::record_fallback(Channel::Sms);
                    self.system_sms()
                }
                Err(e) => Err(e),
            },
        }
    }

    fn system_sms(&self) -> MessagingResult<CachedClient<dyn SmsClient>> {
        let client = match &self.config.system_twilio {
            Some(system) => Some(self.factory.sms_client(
                TwilioCredentials {
                    account_sid: system.account_sid.clone(),
                    auth_token: Zeroizing::new(system.auth_token.clone()),
                    phone_number: system.phone_number.clone(),
                },
                MessagingProvider::System,
            )?),
            None => None,
        };
        Ok(CachedClient {
            client,
            provider: MessagingProvider::System,
        })
    }

    fn custom_sms(&self, tenant: &Tenant) -> MessagingResult<Arc<dyn SmsClient>> {
        let provider = MessagingProvider::CustomTwilio;
        let settings = &tenant.messaging;
        let missing = |field: &str| MessagingError::configuration(provider, format!("{} missing", field));

        let account_sid = present(&settings.twilio_account_sid).ok_or_else(|| missing("Twilio account SID"))?;
        let sealed_token =
            present(&settings.twilio_auth_token_encrypted).ok_or_else(|| missing("Twilio auth token"))?;
        let phone_number =
            present(&settings.twilio_phone_number).ok_or_else(|| missing("Twilio phone number"))?;

        validate_twilio_account_sid(account_sid)
            .and_then(|_| validate_phone_number(phone_number))
            .map_err(|e| MessagingError::configuration(provider, e.to_string()))?;

        let auth_token = self.decrypt(provider, sealed_token)?;
        validate_twilio_auth_token(&auth_token)
            .map_err(|e| MessagingError::configuration(provider, e.to_string()))?;

        self.factory.sms_client(
            TwilioCredentials {
                account_sid: account_sid.to_string(),
                auth_token,
                phone_number: phone_number.to_string(),
            },
            provider,
        )
    }

    fn sms_config(&self, tenant: &Tenant, provider: MessagingProvider) -> ChannelConfig {
        let settings = &tenant.messaging;
        let sender = if provider.is_custom() {
            present(&settings.twilio_phone_number).map(str::to_string)
        } else {
            self.config.system_twilio.as_ref().map(|s| s.phone_number.clone())
        };
        ChannelConfig {
            channel: Channel::Sms,
            provider,
            requested_provider: match settings.sms_provider {
                SmsProviderSetting::System => MessagingProvider::System,
                SmsProviderSetting::CustomTwilio => MessagingProvider::CustomTwilio,
            },
            fallback_enabled: settings.sms_fallback_to_system,
            sender,
            sender_name: None,
        }
    }

    // ========================================================================
    // Email
    // ========================================================================

    fn build_email(&self, tenant: &Tenant) -> MessagingResult<CachedClient<dyn EmailClient>> {
        let settings = &tenant.messaging;
        match settings.email_provider {
            EmailProviderSetting::System => self.system_email(),
            EmailProviderSetting::CustomSendgrid => match self.custom_email(tenant) {
                Ok(client) => Ok(CachedClient {
                    client: Some(client),
                    provider: MessagingProvider::CustomSendgrid,
                }),
                Err(e) if settings.email_fallback_to_system => {
                    warn!(
                        tenant_id = %tenant.tenant_id,
                        channel = "email",
                        error = %e,
                        "Custom SendGrid unavailable, falling back to system provider"
                    );
                    metrics::record_fallback(Channel::Email);
                    self.system_email()
                }
                Err(e) => Err(e),
            },
        }
    }

    fn system_email(&self) -> MessagingResult<CachedClient<dyn EmailClient>> {
        let client = match &self.config.system_sendgrid {
            Some(system) => Some(self.factory.email_client(
                SendGridCredentials {
                    api_key: Zeroizing::new(system.api_key.clone()),
                    from_email: system.from_email.clone(),
                    from_name: Some(system.from_name.clone()),
                },
                MessagingProvider::System,
            )?),
            None => None,
        };
        Ok(CachedClient {
            client,
            provider: MessagingProvider::System,
        })
    }

    fn custom_email(&self, tenant: &Tenant) -> MessagingResult<Arc<dyn EmailClient>> {
        let provider = MessagingProvider::CustomSendgrid;
        let settings = &tenant.messaging;
        let missing = |field: &str| MessagingError::configuration(provider, format!("{} missing", field));

        let sealed_key =
            present(&settings.sendgrid_api_key_encrypted).ok_or_else(|| missing("SendGrid API key"))?;
        let from_email =
            present(&settings.sendgrid_from_email).ok_or_else(|| missing("SendGrid from email"))?;
        if !settings.email_domain_verified {
            return Err(MessagingError::configuration(
                provider,
                "sending domain not verified",
            ));
        }
        validate_email(from_email).map_err(|e| MessagingError::configuration(provider, e.to_string()))?;

        let api_key = self.decrypt(provider, sealed_key)?;
        validate_sendgrid_api_key(&api_key)
            .map_err(|e| MessagingError::configuration(provider, e.to_string()))?;

        self.factory.email_client(
            SendGridCredentials {
                api_key,
                from_email: from_email.to_string(),
                from_name: present(&settings.sendgrid_from_name).map(str::to_string),
            },
            provider,
        )
    }

    fn email_config(&self, tenant: &Tenant, provider: MessagingProvider) -> ChannelConfig {
        let settings = &tenant.messaging;
        let (sender, sender_name) = if provider.is_custom() {
            (
                present(&settings.sendgrid_from_email).map(str::to_string),
                present(&settings.sendgrid_from_name).map(str::to_string),
            )
        } else {
            match &self.config.system_sendgrid {
                Some(s) => (Some(s.from_email.clone()), Some(s.from_name.clone())),
                None => (None, None),
            }
        };
        ChannelConfig {
            channel: Channel::Email,
            provider,
            requested_provider: match settings.email_provider {
                EmailProviderSetting::System => MessagingProvider::System,
                EmailProviderSetting::CustomSendgrid => MessagingProvider::CustomSendgrid,
            },
            fallback_enabled: settings.email_fallback_to_system,
            sender,
            sender_name,
        }
    }
}
