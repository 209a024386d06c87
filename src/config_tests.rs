// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::config::*;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::try_parse_from(["cozystack-operator"]).unwrap();
        assert_eq!(config.hub_namespace, "cozy-system");
        assert_eq!(config.tenant_prefix, "tenant-");
        assert_eq!(config.port, 8080);
        assert!(config.is_enabled(ControllerName::Package));
        assert!(config.is_enabled(ControllerName::Plan));
        assert!(config.is_enabled(ControllerName::FluxPlunger));
        assert_eq!(config.lease_namespace(), "cozy-system");
        assert_eq!(config.config_hash_namespace(), "cozy-system");
        assert_eq!(config.config_hash_name, "cozystack-api");
        assert_eq!(config.config_hash_kind, WorkloadKind::Deployment);
        assert_eq!(config.config_hash_debounce(), Duration::from_secs(5));
        assert_eq!(config.lineage_watch, DEFAULT_LINEAGE_WATCH);
        assert!(!config.install_crds);
    }

    #[test]
    fn test_controller_subset() {
        let config = OperatorConfig::try_parse_from([
            "cozystack-operator",
            "--controllers",
            "package-source,package,backup-job",
        ])
        .unwrap();
        assert!(config.is_enabled(ControllerName::PackageSource));
        assert!(config.is_enabled(ControllerName::BackupJob));
        assert!(!config.is_enabled(ControllerName::Lineage));
        assert!(!config.is_enabled(ControllerName::FluxPlunger));
    }

    #[test]
    fn test_flux_plunger_toggle() {
        let config =
            OperatorConfig::try_parse_from(["cozystack-operator", "--controllers", "flux-plunger"]).unwrap();
        assert!(config.is_enabled(ControllerName::FluxPlunger));
        assert!(!config.is_enabled(ControllerName::Package));
    }

    #[test]
    fn test_invalid_controller_rejected() {
        assert!(
            OperatorConfig::try_parse_from(["cozystack-operator", "--controllers", "dns"]).is_err()
        );
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::try_parse_from([
            "cozystack-operator",
            "--hub-namespace",
            "platform",
            "--leader-election",
            "false",
            "--config-hash-kind",
            "daemon-set",
            "--config-hash-namespace",
            "api",
            "--install-crds",
            "--crd-manifest",
            "/etc/crds.yaml",
        ])
        .unwrap();
        assert_eq!(config.lease_namespace(), "platform");
        assert!(!config.leader_election);
        assert_eq!(config.config_hash_kind, WorkloadKind::DaemonSet);
        assert_eq!(config.config_hash_namespace(), "api");
        assert!(config.install_crds);
        assert_eq!(
            config.crd_manifest.as_deref(),
            Some(std::path::Path::new("/etc/crds.yaml"))
        );
    }
}
