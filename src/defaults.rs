//! Text templates offered by `amdfan print-default`

/// Configuration written when no configuration file exists
pub const DEFAULT_FAN_CONFIG: &str = "\
#Fan Control Matrix.
# [<Temp in C>,<Fanspeed in %>]
speed_matrix:
- [4, 4]
- [30, 33]
- [45, 50]
- [60, 66]
- [65, 69]
- [70, 75]
- [75, 89]
- [80, 100]

# Current Min supported value is 4 due to driver bug
#
# Optional configuration options
#
# Allows for some leeway +/- temp, as to not constantly change fan speed
# threshold: 4
#
# Frequency will change how often we probe for the temp
# frequency: 5
#
# cards:
# can be any card returned from `ls /sys/class/drm | grep \"^card[[:digit:]]$\"`
# - card0
";

const SYSTEMD_SERVICE: &str = "\
[Unit]
Description=amdfan controller

[Service]
ExecStart=/usr/bin/amdfan daemon
ExecReload=kill -HUP $MAINPID
Restart=always

[Install]
WantedBy=multi-user.target
";

/// Service file for the given init system
pub fn service(init: &str) -> Option<&'static str> {
    match init {
        "systemd" => Some(SYSTEMD_SERVICE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::from_yaml(DEFAULT_FAN_CONFIG).unwrap();
        assert_eq!(config.speed_matrix.len(), 8);
        assert!(config.curve().is_ok());
    }

    #[test]
    fn test_service_templates() {
        assert!(service("systemd").unwrap().contains("ExecReload=kill -HUP"));
        assert!(service("openrc").is_none());
    }
}
