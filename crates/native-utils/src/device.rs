use anyhow::{Context, Result};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input
/// device when no name is given.
pub fn get_or_default_input(device_name: Option<String>) -> Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let target = match device_name {
        Some(name) => name,
        None => host
            .default_input_device()
            .context("No default input device")?
            .name()
            .context("Default input device has no name")?,
    };

    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("No input device named '{}'", target))
}

/// Lists every input device with its default channel count and sample rate.
pub fn get_available_inputs() -> Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|device| device.name().ok())
        .unwrap_or_default();

    let mut device_names: Vec<String> = Vec::new();
    for in_device in host.input_devices().context("Failed to enumerate input devices")? {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        let Ok(d_cfg) = in_device.default_input_config() else {
            tracing::debug!("Skipping '{}': no default input config", d_name);
            continue;
        };

        let mut d = format!(
            " * {}({}ch, {}hz)",
            d_name,
            d_cfg.channels(),
            d_cfg.sample_rate().0
        );
        if d_name == default_device {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names.join("\n"))
}
