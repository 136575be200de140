//! Keystone v3 request and response bodies.

use chrono::{DateTime, Utc};
use ostack_core::services::ServiceCatalog;
use serde::{Deserialize, Serialize};

/// `{"name": ..}` reference to a domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainRef {
    /// Domain id, present in responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// User or project reference as returned inside a token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    /// Resource id.
    pub id: String,
    /// Resource name.
    #[serde(default)]
    pub name: String,
    /// Owning domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainRef>,
}

/// The `token` object of a `POST /v3/auth/tokens` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenBody {
    /// Expiry time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Issue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    /// Authentication methods used.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Authenticated user.
    pub user: NamedRef,
    /// Scoped project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    /// Service catalog.
    #[serde(default)]
    pub catalog: ServiceCatalog,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenEnvelope {
    pub token: TokenBody,
}

// Request bodies borrow the password straight from the secret and are never
// Debug-printed.

#[derive(Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub auth: Auth<'a>,
}

#[derive(Serialize)]
pub(crate) struct Auth<'a> {
    pub identity: Identity<'a>,
    pub scope: Scope<'a>,
}

#[derive(Serialize)]
pub(crate) struct Identity<'a> {
    pub methods: [&'static str; 1],
    pub password: PasswordMethod<'a>,
}

#[derive(Serialize)]
pub(crate) struct PasswordMethod<'a> {
    pub user: PasswordUser<'a>,
}

#[derive(Serialize)]
pub(crate) struct PasswordUser<'a> {
    pub name: &'a str,
    pub domain: NameOnly<'a>,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct Scope<'a> {
    pub project: ProjectScope<'a>,
}

#[derive(Serialize)]
pub(crate) struct ProjectScope<'a> {
    pub name: &'a str,
    pub domain: NameOnly<'a>,
}

#[derive(Serialize)]
pub(crate) struct NameOnly<'a> {
    pub name: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub(crate) fn password(
        username: &'a str,
        user_domain: &'a str,
        password: &'a str,
        project: &'a str,
        project_domain: &'a str,
    ) -> Self {
        Self {
            auth: Auth {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: PasswordUser {
                            name: username,
                            domain: NameOnly { name: user_domain },
                            password,
                        },
                    },
                },
                scope: Scope {
                    project: ProjectScope {
                        name: project,
                        domain: NameOnly {
                            name: project_domain,
                        },
                    },
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn password_request_shape() {
        let request = AuthRequest::password("hnerdrum", "insat", "pw", "5SDBD-Virt-B1-5", "insat");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": "hnerdrum",
                                "domain": {"name": "insat"},
                                "password": "pw"
                            }
                        }
                    },
                    "scope": {
                        "project": {"name": "5SDBD-Virt-B1-5", "domain": {"name": "insat"}}
                    }
                }
            })
        );
    }

    #[test]
    fn token_body_parses_keystone_response() {
        let envelope: TokenEnvelope = serde_json::from_value(json!({
            "token": {
                "methods": ["password"],
                "expires_at": "2026-10-18T18:00:00.000000Z",
                "issued_at": "2026-10-18T17:00:00.000000Z",
                "user": {"id": "u1", "name": "alice", "domain": {"id": "d1", "name": "insat"}},
                "project": {"id": "p1", "name": "demo", "domain": {"id": "d1", "name": "insat"}},
                "catalog": [
                    {"type": "compute", "endpoints": [{"interface": "public", "url": "http://nova:8774/v2.1"}]}
                ]
            }
        }))
        .unwrap();

        let token = envelope.token;
        assert_eq!(token.user.name, "alice");
        assert_eq!(token.project.as_ref().map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(token.catalog.entries().len(), 1);
        assert!(token.expires_at.unwrap() > token.issued_at.unwrap());
    }
}
