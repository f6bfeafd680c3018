use serde::{Deserialize, Serialize};

/// Response of `GET /userPreference`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreference {
    pub accounts: Vec<PreferenceAccount>,
    pub streamer_info: Vec<StreamerInfo>,
    pub offers: Vec<Offer>,
}

impl UserPreference {
    pub fn primary_account(&self) -> Option<&PreferenceAccount> {
        self.accounts
            .iter()
            .find(|account| account.primary_account.unwrap_or(false))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceAccount {
    pub account_number: Option<String>,
    pub primary_account: Option<bool>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub nick_name: Option<String>,
    pub account_color: Option<String>,
    pub display_acct_id: Option<String>,
    pub auto_position_effect: Option<bool>,
}

/// Connection details for the streaming API. Only carried through; the
/// streamer itself is not implemented here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamerInfo {
    pub streamer_socket_url: Option<String>,
    pub schwab_client_customer_id: Option<String>,
    pub schwab_client_correl_id: Option<String>,
    pub schwab_client_channel: Option<String>,
    pub schwab_client_function_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Offer {
    pub level2_permissions: Option<bool>,
    pub mkt_data_permission: Option<String>,
}
