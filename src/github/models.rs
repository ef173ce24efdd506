use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Deserialize, Debug)]
pub struct AccessTokenResponse {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct RepositoryPage {
    #[serde(default)]
    pub total_count: Option<u64>,
    pub repositories: Vec<Repository>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub owner: Owner,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Owner {
    pub login: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Installation {
    pub id: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InstallationWithAccount {
    pub id: i64,
    pub account: Account,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Account {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize, Debug)]
pub struct InstallationRepositoriesEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub installation: Installation,
}

#[derive(Deserialize, Debug)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: InstallationWithAccount,
}
