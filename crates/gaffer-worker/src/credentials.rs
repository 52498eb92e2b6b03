//! Values Secret rendering and password generation
//!
//! The Secret handed to a worker pod is the Gaffer's spec plus two kinds of
//! operator-derived overrides: a table permission grant for the graph's own
//! table, and (on first install only) freshly generated Accumulo credentials.
//! Upgrades never touch the credential paths, so Helm's `--reuse-values`
//! keeps the passwords chosen at install time.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use rand::Rng;

use gaffer_common::crd::Gaffer;
use gaffer_common::labels::{INSTANCE_LABEL, MANAGED_BY, MANAGED_BY_LABEL};
use gaffer_common::{Error, Result, SpecNode, SpecTree, VALUES_FILE_KEY};

use crate::config::WorkerConfig;

/// Lowercase, uppercase and digits
pub const ALPHANUMERIC: &[RangeInclusive<char>] = &['a'..='z', 'A'..='Z', '0'..='9'];

/// Where the graph id is read from
pub const GRAPH_ID_PATH: [&str; 3] = ["graph", "config", "graphId"];

/// Permissions granted to the `gaffer` Accumulo user on the graph's table
pub const TABLE_PERMISSIONS: [&str; 4] = ["READ", "WRITE", "BULK_IMPORT", "ALTER_TABLE"];

/// Values paths that receive a generated password on first install
pub const CREDENTIAL_PATHS: [&[&str]; 4] = [
    &["accumulo", "config", "accumuloSite", "instance.secret"],
    &["accumulo", "config", "userManagement", "rootPassword"],
    &["accumulo", "config", "userManagement", "users", "tracer", "password"],
    &["accumulo", "config", "userManagement", "users", "gaffer", "password"],
];

/// Generate `length` characters drawn uniformly from `ranges`.
///
/// Not suitable for long-lived secrets outside the cluster; the passwords only
/// protect in-cluster Accumulo accounts.
pub fn generate_password(length: usize, ranges: &[RangeInclusive<char>]) -> Result<String> {
    if length == 0 {
        return Err(Error::validation("password length must be at least 1"));
    }
    let pool: Vec<char> = ranges.iter().flat_map(|r| r.clone()).collect();
    if pool.is_empty() {
        return Err(Error::validation("password character set is empty"));
    }

    let mut rng = rand::thread_rng();
    Ok((0..length)
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect())
}

/// Path of the table permission override for `graph_id`
pub fn table_permission_path(graph_id: &str) -> Vec<&str> {
    vec![
        "accumulo",
        "config",
        "userManagement",
        "users",
        "gaffer",
        "permissions",
        "table",
        graph_id,
    ]
}

/// Builds the values Secret a worker pod mounts
#[derive(Clone, Debug)]
pub struct CredentialFactory {
    password_length: usize,
}

impl CredentialFactory {
    /// Create a factory generating passwords of `password_length` characters
    pub fn new(password_length: usize) -> Self {
        Self { password_length }
    }

    /// Create a factory from the worker configuration
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.password_length)
    }

    /// Render the Helm values for `gaffer`.
    ///
    /// The resource's own spec is never modified; overrides are applied to a
    /// copy.
    pub fn render_values(&self, gaffer: &Gaffer, is_initial_install: bool) -> Result<SpecTree> {
        let mut values = gaffer.spec.values.clone();

        if let Some(graph_id) = values.get_str(&GRAPH_ID_PATH).map(str::to_string) {
            values.put(
                SpecNode::string_list(TABLE_PERMISSIONS),
                &table_permission_path(&graph_id),
            )?;
        }

        if is_initial_install {
            for path in CREDENTIAL_PATHS {
                let password = generate_password(self.password_length, ALPHANUMERIC)?;
                values.put(password, path)?;
            }
        }

        Ok(values)
    }

    /// Build the Secret holding the rendered values.
    ///
    /// The Secret is named after the Gaffer, lives in its namespace and is
    /// owned by it when the Gaffer has a UID.
    pub fn build_values_secret(&self, gaffer: &Gaffer, is_initial_install: bool) -> Result<Secret> {
        let (name, namespace) = gaffer.identity()?;
        let values = self.render_values(gaffer, is_initial_install)?;

        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
        labels.insert(INSTANCE_LABEL.to_string(), name.clone());

        let mut string_data = BTreeMap::new();
        string_data.insert(VALUES_FILE_KEY.to_string(), values.to_yaml()?);

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels: Some(labels),
                owner_references: gaffer.controller_owner_ref(&()).map(|owner| vec![owner]),
                ..Default::default()
            },
            string_data: Some(string_data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        })
    }
}

/// Whether an existing values Secret was written for this Gaffer.
///
/// A Secret left behind by a deleted Gaffer of the same name is owned by the
/// old UID. Without a UID on the Gaffer there is nothing to compare, so any
/// Secret with the name counts.
pub fn is_values_secret_of(secret: &Secret, gaffer: &Gaffer) -> bool {
    let Some(uid) = gaffer.metadata.uid.as_deref() else {
        return true;
    };
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.uid == uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaffer_common::crd::GafferSpec;
    use gaffer_common::SpecTreeError;

    fn demo_gaffer(spec_yaml: &str) -> Gaffer {
        let mut gaffer = Gaffer::new(
            "demo",
            GafferSpec {
                values: serde_yaml::from_str(spec_yaml).unwrap(),
            },
        );
        gaffer.metadata.namespace = Some("ns1".to_string());
        gaffer
    }

    fn secret_values(secret: &Secret) -> SpecTree {
        let yaml = secret
            .string_data
            .as_ref()
            .and_then(|d| d.get(VALUES_FILE_KEY))
            .expect("values.yaml key");
        serde_yaml::from_str(yaml).unwrap()
    }

    fn in_alphanumeric(c: char) -> bool {
        ALPHANUMERIC.iter().any(|r| r.contains(&c))
    }

    #[test]
    fn password_has_requested_length_and_charset() {
        let password = generate_password(10, ALPHANUMERIC).unwrap();
        assert_eq!(password.chars().count(), 10);
        assert!(password.chars().all(in_alphanumeric));
    }

    #[test]
    fn successive_passwords_differ() {
        let a = generate_password(10, ALPHANUMERIC).unwrap();
        let b = generate_password(10, ALPHANUMERIC).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn single_char_range_is_deterministic() {
        assert_eq!(generate_password(4, &['x'..='x']).unwrap(), "xxxx");
    }

    #[test]
    fn empty_charset_or_zero_length_is_rejected() {
        assert!(generate_password(10, &[]).is_err());
        // 'z'..='a' is an empty range
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = ['z'..='a'];
        assert!(generate_password(10, &reversed).is_err());
        assert!(generate_password(0, ALPHANUMERIC).is_err());
    }

    /// Story: a brand new Gaffer gets passwords at every credential path
    #[test]
    fn story_initial_install_generates_credentials() {
        let gaffer = demo_gaffer("graph:\n  config:\n    graphId: simpleGraph\n");
        let factory = CredentialFactory::new(10);
        let secret = factory.build_values_secret(&gaffer, true).unwrap();

        assert_eq!(secret.metadata.name.as_deref(), Some("demo"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("ns1"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));

        let values = secret_values(&secret);
        for path in CREDENTIAL_PATHS {
            let password = values.get_str(path).expect("password written");
            assert_eq!(password.len(), 10);
            assert!(password.chars().all(in_alphanumeric));
        }
        assert_eq!(
            values.get(&table_permission_path("simpleGraph")),
            Some(&SpecNode::string_list(TABLE_PERMISSIONS))
        );
        assert_eq!(
            values.get_str(&["graph", "config", "graphId"]),
            Some("simpleGraph")
        );
    }

    /// Story: an upgrade reuses whatever the user supplied and never generates
    #[test]
    fn story_upgrade_leaves_credential_paths_alone() {
        let gaffer = demo_gaffer(
            r#"
graph:
  config:
    graphId: simpleGraph
accumulo:
  config:
    userManagement:
      rootPassword: chosen-by-user
"#,
        );
        let factory = CredentialFactory::new(10);
        let values = secret_values(&factory.build_values_secret(&gaffer, false).unwrap());

        assert_eq!(
            values.get_str(&["accumulo", "config", "userManagement", "rootPassword"]),
            Some("chosen-by-user")
        );
        assert_eq!(values.get(CREDENTIAL_PATHS[0]), None);
        assert_eq!(values.get(CREDENTIAL_PATHS[2]), None);
        assert_eq!(values.get(CREDENTIAL_PATHS[3]), None);
        // The table grant is still derived on every render.
        assert!(values.get(&table_permission_path("simpleGraph")).is_some());
    }

    #[test]
    fn no_graph_id_means_no_table_grant() {
        let gaffer = demo_gaffer("api:\n  replicas: 1\n");
        let values = CredentialFactory::new(10)
            .render_values(&gaffer, false)
            .unwrap();
        assert_eq!(values, gaffer.spec.values);
    }

    #[test]
    fn render_does_not_mutate_the_resource() {
        let gaffer = demo_gaffer("graph:\n  config:\n    graphId: g1\n");
        let before = gaffer.spec.values.clone();
        CredentialFactory::new(10)
            .render_values(&gaffer, true)
            .unwrap();
        assert_eq!(gaffer.spec.values, before);
    }

    #[test]
    fn scalar_in_credential_prefix_fails_fast() {
        let gaffer = demo_gaffer("accumulo:\n  config: disabled\n");
        let err = CredentialFactory::new(10)
            .build_values_secret(&gaffer, true)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SpecTree(SpecTreeError::Conflict { ref path }) if path == "accumulo.config"
        ));
    }

    #[test]
    fn owner_reference_requires_uid() {
        let mut gaffer = demo_gaffer("{}");
        let factory = CredentialFactory::new(10);
        let secret = factory.build_values_secret(&gaffer, false).unwrap();
        assert!(secret.metadata.owner_references.is_none());

        gaffer.metadata.uid = Some("uid-123".to_string());
        let secret = factory.build_values_secret(&gaffer, false).unwrap();
        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Gaffer");
        assert_eq!(owners[0].api_version, "gchq.gov.uk/v1");
        assert_eq!(owners[0].uid, "uid-123");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn missing_namespace_fails_before_rendering() {
        let gaffer = Gaffer::new("demo", GafferSpec::default());
        assert!(matches!(
            CredentialFactory::new(10).build_values_secret(&gaffer, true),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn secret_from_a_previous_gaffer_is_not_ours() {
        let factory = CredentialFactory::new(10);
        let mut old = demo_gaffer("{}");
        old.metadata.uid = Some("uid-old".to_string());
        let secret = factory.build_values_secret(&old, true).unwrap();
        assert!(is_values_secret_of(&secret, &old));

        let mut recreated = demo_gaffer("{}");
        recreated.metadata.uid = Some("uid-new".to_string());
        assert!(!is_values_secret_of(&secret, &recreated));

        let unowned = Secret::default();
        assert!(!is_values_secret_of(&unowned, &recreated));
        assert!(is_values_secret_of(&unowned, &demo_gaffer("{}")));
    }
}
