//! VCD waveform dumping over the declared signals of the scope tree.

use crate::net::{NetArena, NetId};
use crate::scope::ScopeArena;
use crate::vector4::Vector4;
use bit_set::BitSet;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct VcdWriter {
    writer: BufWriter<File>,
    id_map: HashMap<NetId, (String, usize)>,
    signal_order: Vec<NetId>,
    last_values: HashMap<NetId, Vector4>,
    changed: BitSet,
    header_done: bool,
    last_timestamp: Option<u64>,
}

impl VcdWriter {
    pub fn new<P: AsRef<Path>>(
        path: P,
        scopes: &ScopeArena,
        nets: &NetArena,
    ) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let mut id_map = HashMap::new();
        let mut signal_order = Vec::new();
        let mut next_id_num = 0;

        writeln!(writer, "$date")?;
        writeln!(
            writer,
            "  {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$version")?;
        writeln!(writer, "  quarta")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$timescale 1ns $end")?;

        for scope_id in scopes.iter_ids() {
            let scope = scopes.scope(scope_id);
            if scope.nets.is_empty() {
                continue;
            }
            writeln!(writer, "$scope module {} $end", scope.full_name(scopes))?;
            let mut named: Vec<(String, NetId, usize)> = scope
                .nets
                .iter()
                .filter_map(|net| {
                    nets.node(*net)
                        .name
                        .as_ref()
                        .map(|name| (name.clone(), *net, nets.signal_width(*net)))
                })
                .collect();
            named.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, net, width) in named {
                let vcd_id = Self::generate_vcd_id(next_id_num);
                next_id_num += 1;
                writeln!(writer, "$var wire {width} {vcd_id} {name} $end")?;
                id_map.insert(net, (vcd_id, width));
                signal_order.push(net);
            }
            writeln!(writer, "$upscope $end")?;
        }

        writeln!(writer, "$enddefinitions $end")?;

        Ok(VcdWriter {
            writer,
            id_map,
            signal_order,
            last_values: HashMap::new(),
            changed: BitSet::new(),
            header_done: false,
            last_timestamp: None,
        })
    }

    /// Short printable-character identifiers, `!`, `"`, ... aa, ab, ...
    fn generate_vcd_id(mut num: usize) -> String {
        let mut id = String::new();
        loop {
            id.push((b'!' + (num % 94) as u8) as char);
            num /= 94;
            if num == 0 {
                break;
            }
            num -= 1;
        }
        id
    }

    /// Record that a net's value may have changed since the last dump.
    pub fn note_change(&mut self, net: NetId) {
        if self.id_map.contains_key(&net) {
            self.changed.insert(net.index());
        }
    }

    /// Emit value changes at `timestamp`. The first dump emits a full
    /// `$dumpvars` snapshot; later dumps only write changed signals.
    pub fn dump<F>(&mut self, timestamp: u64, read: F) -> std::io::Result<()>
    where
        F: Fn(NetId) -> Vector4,
    {
        let mut time_written = false;
        let order: Vec<NetId> = self.signal_order.clone();

        if !self.header_done {
            writeln!(self.writer, "$dumpvars")?;
            for net in &order {
                let value = read(*net);
                self.write_value(*net, &value)?;
                self.last_values.insert(*net, value);
            }
            writeln!(self.writer, "$end")?;
            self.header_done = true;
            self.changed.clear();
            self.last_timestamp = Some(timestamp);
            return Ok(());
        }

        for net in &order {
            if !self.changed.contains(net.index()) {
                continue;
            }
            let value = read(*net);
            if self.last_values.get(net) == Some(&value) {
                continue;
            }
            if !time_written && self.last_timestamp != Some(timestamp) {
                writeln!(self.writer, "#{timestamp}")?;
                self.last_timestamp = Some(timestamp);
                time_written = true;
            }
            self.write_value(*net, &value)?;
            self.last_values.insert(*net, value);
        }
        self.changed.clear();
        self.writer.flush()
    }

    fn write_value(&mut self, net: NetId, value: &Vector4) -> std::io::Result<()> {
        let (id, width) = self.id_map[&net].clone();
        if width == 1 {
            writeln!(self.writer, "{value}{id}")
        } else {
            writeln!(self.writer, "b{value} {id}")
        }
    }
}
