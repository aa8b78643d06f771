use url::Url;

use crate::domain::entities::identity::Identity;

/// Builds the outbound URL to the provider's hosted checkout.
///
/// The email pre-fills the checkout form; the user id rides along as custom
/// data the provider echoes back in webhook payloads, which is what lets
/// webhook ingestion resolve identity directly instead of falling back to
/// email matching.
pub struct CheckoutUseCases {
    checkout_base_url: Url,
}

impl CheckoutUseCases {
    pub fn new(checkout_base_url: Url) -> Self {
        Self { checkout_base_url }
    }

    pub fn build_checkout_url(&self, identity: &Identity) -> Url {
        let mut url = self.checkout_base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("checkout[email]", &identity.email);
            if let Some(user_id) = identity.user_id {
                pairs.append_pair("checkout[custom][user_id]", &user_id.to_string());
            }
        }
        url
    }
}
