use super::{json_pretty, Context, EXIT_SUCCESS};
use mowerctl_devices::{scan_devices, Udevadm, UsbDevice};

#[derive(Debug, Clone, Copy)]
pub enum Projection {
    Names,
    Info,
}

pub fn run(ctx: &Context, projection: Projection) -> Result<u8, String> {
    let udev = Udevadm::new();
    let devices: Vec<UsbDevice> = scan_devices(&ctx.config.sysfs_root, &udev).collect();

    if ctx.json {
        let out = match projection {
            Projection::Names => json_pretty(
                &devices
                    .iter()
                    .map(UsbDevice::name_line)
                    .collect::<Vec<_>>(),
            )?,
            Projection::Info => json_pretty(&devices)?,
        };
        println!("{out}");
        return Ok(EXIT_SUCCESS);
    }

    for device in &devices {
        match projection {
            Projection::Names => println!("{}", device.name_line()),
            Projection::Info => println!("{}", device.info_line()),
        }
    }
    Ok(EXIT_SUCCESS)
}
