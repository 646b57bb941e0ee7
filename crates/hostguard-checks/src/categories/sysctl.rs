//! Kernel parameters written to a sysctl.d drop-in

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::ContentAudit;
use hostguard_core::{Audit, Result};
use hostguard_policy::Settings;

const SYSCTL_CONF: &str = "/etc/sysctl.d/99-hostguard-hardening.conf";

/// Parameters that do not depend on policy
const FIXED_PARAMETERS: &[(&str, &str)] = &[
    ("net.ipv4.conf.all.rp_filter", "1"),
    ("net.ipv4.conf.default.rp_filter", "1"),
    ("net.ipv4.icmp_echo_ignore_broadcasts", "1"),
    ("net.ipv4.icmp_ignore_bogus_error_responses", "1"),
    ("net.ipv4.icmp_ratelimit", "100"),
    ("net.ipv4.icmp_ratemask", "88089"),
    ("net.ipv4.tcp_timestamps", "0"),
    ("net.ipv4.tcp_rfc1337", "1"),
    ("net.ipv4.tcp_syncookies", "1"),
    ("net.ipv4.conf.all.shared_media", "1"),
    ("net.ipv4.conf.default.shared_media", "1"),
    ("net.ipv4.conf.all.accept_source_route", "0"),
    ("net.ipv4.conf.default.accept_source_route", "0"),
    ("net.ipv4.conf.all.accept_redirects", "0"),
    ("net.ipv4.conf.default.accept_redirects", "0"),
    ("net.ipv6.conf.all.accept_redirects", "0"),
    ("net.ipv6.conf.default.accept_redirects", "0"),
    ("net.ipv4.conf.all.secure_redirects", "0"),
    ("net.ipv4.conf.default.secure_redirects", "0"),
    ("net.ipv4.conf.all.send_redirects", "0"),
    ("net.ipv4.conf.default.send_redirects", "0"),
    ("net.ipv4.conf.all.log_martians", "0"),
    ("net.ipv6.conf.default.router_solicitations", "0"),
    ("net.ipv6.conf.default.accept_ra_rtr_pref", "0"),
    ("net.ipv6.conf.default.accept_ra_pinfo", "0"),
    ("net.ipv6.conf.default.accept_ra_defrtr", "0"),
    ("net.ipv6.conf.default.autoconf", "0"),
    ("net.ipv6.conf.default.dad_transmits", "0"),
    ("net.ipv6.conf.default.max_addresses", "1"),
    ("net.ipv6.conf.all.accept_ra", "0"),
    ("net.ipv6.conf.default.accept_ra", "0"),
    ("kernel.randomize_va_space", "2"),
];

pub struct SysctlCategory;

fn flag(enabled: bool) -> String {
    String::from(if enabled { "1" } else { "0" })
}

/// `key=value` lines in file order; `sysctl.kernel_parameters` entries
/// replace derived values with the same key and append the rest
pub(crate) fn parameters(s: &Settings<'_>) -> Result<Vec<String>> {
    let forwarding = s.bool("network", "ip_forwarding")?;
    let ipv6 = s.bool("network", "ipv6_enable")?;
    let arp_restricted = s.bool("network", "arp_restricted")?;
    let module_loading = s.bool("security", "kernel_enable_module_loading")?;
    let core_dump = s.bool("security", "kernel_enable_core_dump")?;
    let sysrq = if s.bool("sysctl", "kernel_enable_sysrq")? {
        s.int("sysctl", "kernel_secure_sysrq")?.to_string()
    } else {
        "0".to_string()
    };
    let overrides = s.map("sysctl", "kernel_parameters")?;

    let mut params: Vec<(String, String)> = vec![
        ("net.ipv4.ip_forward".into(), flag(forwarding)),
        ("net.ipv6.conf.all.forwarding".into(), flag(forwarding)),
        ("net.ipv6.conf.all.disable_ipv6".into(), flag(!ipv6)),
        (
            "net.ipv4.conf.all.arp_ignore".into(),
            if arp_restricted { "1" } else { "0" }.into(),
        ),
        (
            "net.ipv4.conf.all.arp_announce".into(),
            if arp_restricted { "2" } else { "0" }.into(),
        ),
        ("kernel.modules_disabled".into(), flag(!module_loading)),
        ("kernel.sysrq".into(), sysrq),
        ("fs.suid_dumpable".into(), flag(core_dump)),
    ];
    params.extend(
        FIXED_PARAMETERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    for (key, value) in overrides {
        match params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => params.push((key.clone(), value.to_string())),
        }
    }

    Ok(params
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect())
}

impl CategoryCollector for SysctlCategory {
    fn name(&self) -> &'static str {
        "sysctl"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let params = parameters(&ctx.settings())?;
        Ok(vec![Box::new(ContentAudit::new(
            SYSCTL_CONF,
            "99-hardening-sysctl.conf",
            ContextBuilder::new().set("parameters", params).build(),
            root_owned(0o644)?,
            ctx.renderer(),
        ))])
    }
}
