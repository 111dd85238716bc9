use anyhow::{Result, bail};

/// Character that joins identifier components.
pub const ID_DELIMITER: char = '-';

/// Stand-in for `-` inside an identifier component.
pub const ID_ESCAPE: char = '_';

/// Validate a namespace or name before it becomes an identifier component.
/// Rules: non-empty, no `_` (reserved for escaping) and no `/` (key separator).
pub fn validate_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} must not be empty", field);
    }
    if value.contains(ID_ESCAPE) {
        bail!("{} '{}' must not contain '{}'", field, value, ID_ESCAPE);
    }
    if value.contains('/') {
        bail!("{} '{}' must not contain '/'", field, value);
    }
    Ok(())
}

/// Validate a comma-separated port list such as `8000,8080`.
pub fn parse_port_list(raw: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let port: u16 = match part.parse() {
            Ok(p) => p,
            Err(_) => bail!("invalid port '{}' in '{}'", part, raw),
        };
        if port == 0 {
            bail!("port 0 is not a valid proxy port");
        }
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_components() {
        assert!(validate_component("name", "nginx").is_ok());
        assert!(validate_component("name", "my-app").is_ok());
        assert!(validate_component("name", "web.v1").is_ok());
        assert!(validate_component("namespace", "kube-system").is_ok());
    }

    #[test]
    fn invalid_components() {
        assert!(validate_component("name", "").is_err());
        assert!(validate_component("name", "my_app").is_err());
        assert!(validate_component("name", "a/b").is_err());
    }

    #[test]
    fn port_lists() {
        assert_eq!(parse_port_list("8000").unwrap(), vec![8000]);
        assert_eq!(parse_port_list("8000, 8080,8000").unwrap(), vec![8000, 8080]);
        assert!(parse_port_list("").unwrap().is_empty());
        assert!(parse_port_list("80,http").is_err());
        assert!(parse_port_list("70000").is_err());
        assert!(parse_port_list("0").is_err());
    }
}
