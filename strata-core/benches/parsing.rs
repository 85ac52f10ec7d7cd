//! Benchmarks for parsing, graph finalization and chunking.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_core::chunker;
use strata_core::parser::java;
use strata_core::pipeline::AnalysisRun;
use strata_core::types::SourceUnit;

const CONTROLLER: &str = r#"
package shop.web;

import java.util.List;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api/orders")
public class OrderController {
    private final OrderService orderService;

    public OrderController(OrderService orderService) {
        this.orderService = orderService;
    }

    @GetMapping("/{id}")
    public Order getOrder(@PathVariable Long id) {
        Order order = orderService.find(id);
        if (order == null || order.isDeleted()) {
            throw new NotFoundException(id);
        }
        return order;
    }

    @GetMapping
    public List<Order> search(@RequestParam String status, @RequestParam int page) {
        for (int i = 0; i < page; i++) {
            if (status.isEmpty() && i > 3) {
                break;
            }
        }
        return orderService.search(status, page);
    }

    @PostMapping
    public Order create(@RequestBody Order order) {
        try {
            return orderService.save(order);
        } catch (IllegalStateException e) {
            return null;
        }
    }
}
"#;

fn bench_parse_java(c: &mut Criterion) {
    c.bench_function("parse_java_controller", |b| {
        b.iter(|| java::parse(black_box(CONTROLLER), "OrderController.java"))
    });
}

fn bench_run_200_files(c: &mut Criterion) {
    let units: Vec<SourceUnit> = (0..200)
        .map(|i| {
            let source = CONTROLLER.replace("OrderController", &format!("OrderController{}", i));
            SourceUnit::new(format!("web/OrderController{}.java", i), source)
        })
        .collect();

    c.bench_function("analyze_200_files", |b| {
        b.iter(|| {
            let mut run = AnalysisRun::new();
            let _ = run.offer_all(black_box(&units));
            let _ = run.finalize().map(|g| g.class_count());
        })
    });
}

fn bench_chunk(c: &mut Criterion) {
    let content = CONTROLLER.repeat(200);
    c.bench_function("chunk_large_source", |b| {
        b.iter(|| chunker::chunk(black_box(&content), 1200, 200))
    });
}

criterion_group!(benches, bench_parse_java, bench_run_200_files, bench_chunk);
criterion_main!(benches);
