//! User and role lookups against a Eureka! Clinical service.
//!
//! Free functions over any [`BackendClient`]; the same calls work against a
//! service directly or through a webapp's proxy mount, selected by
//! [`ServicePaths`].

use std::collections::HashSet;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::client::headers::bearer;
use crate::client::BackendClient;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub default_role: bool,
}

/// Where the user and role resources live on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePaths {
    /// Calling the service itself.
    Service,
    /// Calling a webapp that proxies the service under `/proxy-resource`.
    Proxied,
}

impl ServicePaths {
    fn users(self) -> &'static str {
        match self {
            ServicePaths::Service => "/api/protected/users",
            ServicePaths::Proxied => "/proxy-resource/users",
        }
    }

    fn roles(self) -> &'static str {
        match self {
            ServicePaths::Service => "/api/protected/roles",
            ServicePaths::Proxied => "/proxy-resource/roles",
        }
    }
}

fn auth_headers(token: Option<&str>) -> Result<Option<HeaderMap>> {
    token.map(bearer).transpose()
}

fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

pub async fn get_users(
    client: &BackendClient,
    paths: ServicePaths,
    token: Option<&str>,
) -> Result<Vec<User>> {
    let headers = auth_headers(token)?;
    client
        .get_json_with(paths.users(), &[], headers.as_ref())
        .await
}

pub async fn get_me(client: &BackendClient, paths: ServicePaths, token: Option<&str>) -> Result<User> {
    let headers = auth_headers(token)?;
    let path = format!("{}/me", paths.users());
    client.get_json_with(&path, &[], headers.as_ref()).await
}

pub async fn get_user_by_id(
    client: &BackendClient,
    paths: ServicePaths,
    id: i64,
    token: Option<&str>,
) -> Result<User> {
    let headers = auth_headers(token)?;
    let path = format!("{}/{id}", paths.users());
    client.get_json_with(&path, &[], headers.as_ref()).await
}

pub async fn get_roles(
    client: &BackendClient,
    paths: ServicePaths,
    token: Option<&str>,
) -> Result<Vec<Role>> {
    let headers = auth_headers(token)?;
    client
        .get_json_with(paths.roles(), &[], headers.as_ref())
        .await
}

pub async fn get_role(
    client: &BackendClient,
    paths: ServicePaths,
    id: i64,
    token: Option<&str>,
) -> Result<Role> {
    let headers = auth_headers(token)?;
    let path = format!("{}/{id}", paths.roles());
    client.get_json_with(&path, &[], headers.as_ref()).await
}

pub async fn get_role_by_name(
    client: &BackendClient,
    paths: ServicePaths,
    name: &str,
    token: Option<&str>,
) -> Result<Role> {
    let headers = auth_headers(token)?;
    let path = format!("{}/byname/{}", paths.roles(), segment(name));
    client.get_json_with(&path, &[], headers.as_ref()).await
}

/// Names of the roles assigned to the current user.
pub async fn role_names_for_me(
    client: &BackendClient,
    paths: ServicePaths,
    token: Option<&str>,
) -> Result<HashSet<String>> {
    let roles = get_roles(client, paths, token).await?;
    let me = get_me(client, paths, token).await?;
    Ok(role_names(&roles, &me))
}

fn role_names(roles: &[Role], user: &User) -> HashSet<String> {
    roles
        .iter()
        .filter(|role| user.roles.contains(&role.id))
        .map(|role| role.name.clone())
        .collect()
}
