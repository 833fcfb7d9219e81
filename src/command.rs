//! Shell command strings sent to the remote node.

use colored::*;

use crate::config::KerberosRenewal;

/// Import hook location, relative to the Atlas home directory.
pub const IMPORT_SCRIPT: &str = "hook-bin/import-hive.sh";

pub const KINIT: &str = "kinit";

/// `<atlas_home>/hook-bin/import-hive.sh -f <remote_sources_file>`.
///
/// Trailing `/` on `atlas_home` is dropped so the join never doubles it.
pub fn build_import_command(atlas_home: &str, remote_sources_file: &str) -> String {
    println!("{}", format!("INFO: Atlas home is set to: {atlas_home}").green());
    let script = format!("{}/{}", atlas_home.trim_end_matches('/'), IMPORT_SCRIPT);
    format!("{script} -f {remote_sources_file}")
}

/// `kinit` for a headless keytab, `kinit -kt <keytab>` otherwise.
pub fn build_kerberos_renew_command(keytab: Option<&str>) -> String {
    match keytab {
        None => {
            println!("{}", "INFO: Headless keytab is being used".green());
            KINIT.to_string()
        }
        Some(path) => {
            println!(
                "{}",
                format!("INFO: Renewing Kerberos ticket using this keytab {path}").green()
            );
            format!("{KINIT} -kt {path}")
        }
    }
}

/// Full script for one remote shell: renewal first when Kerberos is on.
pub fn compose_command(import_command: &str, renewal: Option<&KerberosRenewal<'_>>) -> String {
    match renewal {
        None => import_command.to_string(),
        Some(mode) => {
            let keytab = match mode {
                KerberosRenewal::Headless => None,
                KerberosRenewal::Keytab(path) => Some(*path),
            };
            format!("{}\n{}", build_kerberos_renew_command(keytab), import_command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_command_with_trailing_slash() {
        assert_eq!(
            build_import_command("/opt/atlas/", "/tmp/x.csv"),
            "/opt/atlas/hook-bin/import-hive.sh -f /tmp/x.csv"
        );
    }

    #[test]
    fn import_command_without_trailing_slash() {
        assert_eq!(
            build_import_command("/opt/atlas", "/tmp/x.csv"),
            "/opt/atlas/hook-bin/import-hive.sh -f /tmp/x.csv"
        );
    }

    #[test]
    fn import_command_collapses_repeated_slashes() {
        assert_eq!(
            build_import_command("/opt/atlas///", "/tmp/x.csv"),
            "/opt/atlas/hook-bin/import-hive.sh -f /tmp/x.csv"
        );
    }

    #[test]
    fn import_command_ends_with_file_flag() {
        let cmd = build_import_command("/usr/hdp/current/atlas-server", "/var/tmp/s p.csv");
        assert!(cmd.ends_with(" -f /var/tmp/s p.csv"));
    }

    #[test]
    fn renew_command_variants() {
        assert_eq!(build_kerberos_renew_command(None), "kinit");
        assert_eq!(
            build_kerberos_renew_command(Some("/etc/keytabs/svc.keytab")),
            "kinit -kt /etc/keytabs/svc.keytab"
        );
    }

    #[test]
    fn compose_without_kerberos_is_import_only() {
        assert_eq!(compose_command("import", None), "import");
    }

    #[test]
    fn compose_puts_renewal_first() {
        let import = build_import_command("/opt/atlas/", "/tmp/x.csv");
        assert_eq!(
            compose_command(&import, Some(&KerberosRenewal::Headless)),
            "kinit\n/opt/atlas/hook-bin/import-hive.sh -f /tmp/x.csv"
        );
        assert_eq!(
            compose_command(&import, Some(&KerberosRenewal::Keytab("/k.keytab"))),
            "kinit -kt /k.keytab\n/opt/atlas/hook-bin/import-hive.sh -f /tmp/x.csv"
        );
    }
}
