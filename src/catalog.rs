//! Built-in snapshot commands and candidate file globs.
//!
//! The glob list is a priority ranking: when the archive budget runs out,
//! everything after the stopping point is dropped, so small high-value files
//! come first and bulky rotated logs come last.

/// Snapshot commands run on every collection: `(label, command, timeout_secs)`.
pub const DEFAULT_SNAPSHOTS: &[(&str, &str, Option<u64>)] = &[
    ("uname", "uname -a", None),
    ("uptime", "uptime", None),
    ("os-release", "cat /etc/os-release", None),
    ("df", "df -h", None),
    ("df-inodes", "df -i", None),
    ("free", "free -m", None),
    ("mounts", "mount", None),
    ("lsblk", "lsblk -a", None),
    ("ps", "ps -auxf", None),
    ("lsmod", "lsmod", None),
    ("sysctl", "sysctl -a", None),
    ("ip-addr", "ip -d addr show", None),
    ("ip-link", "ip -d link show", None),
    ("ip-route", "ip -d route show table all", None),
    ("ip6-route", "ip -6 -d route show table all", None),
    ("ip-rule", "ip rule show", None),
    ("ip-neigh", "ip -d neigh show", None),
    ("sockets", "ss -anp", None),
    ("iptables", "iptables-save", None),
    ("ip6tables", "ip6tables-save", None),
    ("nftables", "nft list ruleset", None),
    ("conntrack", "conntrack -S", None),
    ("systemctl-units", "systemctl list-units --all --no-pager", None),
    ("systemctl-failed", "systemctl list-units --failed --no-pager", None),
    ("dmesg", "dmesg -T", None),
    (
        "journal-kubelet",
        "journalctl --no-pager -u kubelet --since '-3h'",
        Some(120),
    ),
    (
        "journal-containerd",
        "journalctl --no-pager -u containerd --since '-3h'",
        Some(120),
    ),
    ("crictl-pods", "crictl pods", Some(60)),
    ("crictl-ps", "crictl ps -a", Some(60)),
    ("crictl-images", "crictl images", Some(60)),
    ("crictl-info", "crictl info", Some(60)),
];

/// Candidate files in priority order, highest first.
pub const DEFAULT_CANDIDATE_GLOBS: &[&str] = &[
    "/etc/default/kubelet",
    "/etc/resolv.conf",
    "/run/systemd/resolve/resolv.conf",
    "/etc/cni/net.d/*",
    "/etc/containerd/*",
    "/etc/kubernetes/manifests/*",
    "/etc/systemd/system/kubelet.service.d/*",
    "/var/log/azure-cni*",
    "/var/log/azure-cns*",
    "/var/log/azure-ipam*",
    "/var/log/azure-npm*",
    "/var/log/azure-vnet*",
    "/var/log/cilium-cni*",
    "/var/run/azure-vnet*",
    "/var/run/azure-cns*",
    "/var/log/cloud-init.log",
    "/var/log/cloud-init-output.log",
    "/var/log/waagent.log",
    "/var/log/azure/*.log",
    "/var/log/azure/**/*.log",
    "/var/log/containers/*",
    "/var/log/pods/*/*/*.log",
    "/var/log/syslog",
    "/var/log/messages",
    "/var/log/kern.log",
    "/var/log/syslog.*",
    "/var/log/messages.*",
    "/var/log/kern.log.*",
];

/// Default upper bound for the finished archive, in bytes.
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 10 * 1024 * 1024;
/// Default archive file name inside the scratch area.
pub const DEFAULT_ARCHIVE_NAME: &str = "node_logs.zip";
/// Default hand-off location read by the upload sink.
pub const DEFAULT_HANDOFF_PATH: &str = "/var/lib/waagent/logcollector/logs.zip";
/// Default upload command; it takes no arguments and reads the hand-off file.
pub const DEFAULT_UPLOAD_COMMAND: &str = "python3 -u /opt/azure/containers/aks-log-collector-send.py";
