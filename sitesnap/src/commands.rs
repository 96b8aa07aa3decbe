use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitesnap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitesnap")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .arg(
            arg!(--"root" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding the snapshots")
                .default_value("~/.local/share/sitesnap/"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("archive")
                .about("Mirror a site into a new snapshot")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The root URL to archive"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("How many links away from the root to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(-m --"max-pages" <MAX_PAGES>)
                        .required(false)
                        .help("Stop after this many pages")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("60"),
                )
                .arg(
                    arg!(--"relative-links")
                        .required(false)
                        .help(
                            "Link pages by bare file name so the snapshot can be browsed \
                        straight from disk",
                        )
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("sites")
                .about("List archived sites")
                .arg(arg!(--"json" "Print JSON instead of a table").required(false)),
        )
        .subcommand(
            command!("snapshots")
                .about("List the snapshots of one site")
                .arg(arg!(<HOST>).help("Host identifier, as shown by `sites`"))
                .arg(arg!(--"json" "Print JSON instead of a table").required(false)),
        )
        .subcommand(
            command!("delete")
                .about("Delete snapshots")
                .subcommand_required(true)
                .subcommand(
                    command!("snapshot")
                        .about("Delete one snapshot")
                        .arg(arg!(<HOST>).help("Host identifier"))
                        .arg(arg!(<TS>).help("Snapshot timestamp")),
                )
                .subcommand(
                    command!("host")
                        .about("Delete every snapshot of a site")
                        .arg(arg!(<HOST>).help("Host identifier")),
                )
                .subcommand(
                    command!("all").about("Delete every snapshot of every site").arg(
                        arg!(--"confirm" <TOKEN>)
                            .required(false)
                            .help("Must be ALL"),
                    ),
                ),
        )
}
